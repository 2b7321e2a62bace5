//! Back-reference from bound definitions to their machine.

use crate::core::SharedData;
use crate::error::MachineError;
use crate::machine::controller::{MachineInner, StateMachine};
use serde_json::Value;
use std::fmt;
use std::rc::Weak;
use tracing::warn;

/// Handle passed to every hook, giving access to the owning machine.
///
/// The handle does not keep the machine alive. A detached handle (or one
/// whose machine was dropped) turns every operation into a no-op.
#[derive(Clone, Default)]
pub struct MachineHandle {
    inner: Weak<MachineInner>,
}

impl MachineHandle {
    /// A handle bound to no machine.
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn new(inner: Weak<MachineInner>) -> Self {
        Self { inner }
    }

    /// The owning machine, if it is still alive.
    pub fn machine(&self) -> Option<StateMachine> {
        self.inner.upgrade().map(StateMachine::from_inner)
    }

    pub fn is_bound(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// The machine's shared store. Detached handles get a fresh empty store.
    pub fn data(&self) -> SharedData {
        self.inner
            .upgrade()
            .map(|inner| inner.data().clone())
            .unwrap_or_default()
    }

    /// See [`StateMachine::change_state`].
    pub fn change_state(&self, target: &str) -> Result<(), MachineError> {
        match self.machine() {
            Some(machine) => machine.change_state(target),
            None => Ok(()),
        }
    }

    /// See [`StateMachine::change_data`].
    pub fn change_data(&self, key: &str, value: impl Into<Value>) {
        if let Some(machine) = self.machine() {
            machine.change_data(key, value);
        }
    }

    /// Name of the current state, or an empty string when detached.
    pub fn current_state(&self) -> String {
        self.machine()
            .map(|machine| machine.current_state())
            .unwrap_or_default()
    }

    /// Name of the previous state, or an empty string when detached.
    pub fn previous_state(&self) -> String {
        self.machine()
            .map(|machine| machine.previous_state())
            .unwrap_or_default()
    }

    /// Move on to `next` once the current state has finished its work.
    ///
    /// When `next` is not registered, a warning is logged and the machine
    /// falls back to re-entering the current state, which is a no-op.
    pub fn complete(&self, next: &str) -> Result<(), MachineError> {
        let Some(machine) = self.machine() else {
            return Ok(());
        };
        if machine.has_state(next) {
            return machine.change_state(next);
        }
        let current = machine.current_state();
        warn!(
            machine = machine.label(),
            target = next,
            fallback = %current,
            "completion target not found, staying in the current state"
        );
        machine.change_state(&current)
    }
}

impl fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandle")
            .field("bound", &self.is_bound())
            .finish()
    }
}
