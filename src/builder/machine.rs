//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::core::{SharedData, DEFAULT_HISTORY_LIMIT};
use crate::definition::StateDef;
use crate::machine::registry::validate_definitions;
use crate::machine::StateMachine;
use serde_json::Value;
use stillwater::validation::Validation;

/// Builder for constructing state machines with a fluent API.
pub struct StateMachineBuilder {
    initial: Option<String>,
    states: Vec<StateDef>,
    data: Value,
    label: String,
    history_limit: usize,
}

impl StateMachineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            data: Value::Null,
            label: "machine".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, name: impl Into<String>) -> Self {
        self.initial = Some(name.into());
        self
    }

    /// Add a state definition.
    pub fn state(mut self, state: StateDef) -> Self {
        self.states.push(state);
        self
    }

    /// Add multiple state definitions at once.
    pub fn states(mut self, states: impl IntoIterator<Item = StateDef>) -> Self {
        self.states.extend(states);
        self
    }

    /// Seed the shared store. Must be a JSON object; anything else is
    /// replaced with an empty mapping when the machine is built.
    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Name recorded on every log event of this machine.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Number of state changes kept in the history.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the state machine and enter the initial state.
    ///
    /// Definitions are validated as a whole: the error lists every problem
    /// found, not just the first.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }

        if let Validation::Failure(errors) = validate_definitions(&initial, &self.states) {
            return Err(BuildError::InvalidDefinitions {
                violations: errors.iter().cloned().collect(),
            });
        }

        let data = SharedData::from_value(self.data);
        Ok(StateMachine::start(
            &initial,
            self.states,
            data,
            self.label,
            self.history_limit,
        ))
    }
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
