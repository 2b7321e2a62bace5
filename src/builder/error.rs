//! Construction errors for state machines.

use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(name) before .build()")]
    MissingInitialState,

    #[error("No states defined. Add at least one state")]
    NoStates,

    #[error("Invalid state definitions: {}", list(violations))]
    InvalidDefinitions { violations: Vec<DefinitionViolation> },
}

impl BuildError {
    /// Violations found while validating definitions, if any.
    pub fn violations(&self) -> &[DefinitionViolation] {
        match self {
            Self::InvalidDefinitions { violations } => violations,
            _ => &[],
        }
    }
}

/// A single problem found in the supplied definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionViolation {
    #[error("state name is empty")]
    EmptyStateName,

    #[error("state '{name}' is defined more than once")]
    DuplicateState { name: String },

    #[error("initial state '{name}' is not among the defined states")]
    InitialStateNotFound { name: String },

    #[error("state '{state}' has more than one transition named '{name}'")]
    DuplicateTransition { state: String, name: String },

    #[error("transition '{name}' of state '{state}' is invalid: {reason}")]
    InvalidTransition {
        state: String,
        name: String,
        reason: String,
    },
}

fn list(violations: &[DefinitionViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
