//! Runtime error types.

use thiserror::Error;

/// Errors returned by a running state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("State '{name}' is not registered with this machine")]
    UnknownState { name: String },
}

/// Error reported by a lifecycle hook.
///
/// Hooks run as scheduled tasks, so a failure is logged by the scheduler and
/// never unwinds the controller that dispatched the hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("Hook failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Machine(#[from] MachineError),
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Return type of every lifecycle hook.
pub type HookResult = Result<(), HookError>;
