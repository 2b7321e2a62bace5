//! Registry of the states bound to one machine.
//!
//! Definitions are validated up front, accumulating every violation, then
//! bound to the machine: each bound state and transition keeps its own copy
//! of the definition together with a handle back to the machine.

use crate::builder::DefinitionViolation;
use crate::core::DataChange;
use crate::definition::{StateDef, TransitionDef};
use crate::error::HookResult;
use crate::machine::MachineHandle;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::warn;

type Check = Validation<(), NonEmptyVec<DefinitionViolation>>;

/// Validate a set of state definitions, collecting ALL violations.
pub(crate) fn validate_definitions(initial: &str, states: &[StateDef]) -> Check {
    let mut checks: Vec<Check> = Vec::new();
    let mut seen = HashSet::new();

    for state in states {
        if state.name().is_empty() {
            checks.push(Validation::fail(DefinitionViolation::EmptyStateName));
        } else if !seen.insert(state.name()) {
            checks.push(Validation::fail(DefinitionViolation::DuplicateState {
                name: state.name().to_string(),
            }));
        }

        let mut transition_names = HashSet::new();
        for transition in state.transitions() {
            if transition.target_state().is_empty() {
                checks.push(Validation::fail(DefinitionViolation::InvalidTransition {
                    state: state.name().to_string(),
                    name: transition.name().to_string(),
                    reason: "no target state".to_string(),
                }));
            }
            if !transition_names.insert(transition.name()) {
                checks.push(Validation::fail(DefinitionViolation::DuplicateTransition {
                    state: state.name().to_string(),
                    name: transition.name().to_string(),
                }));
            }
        }
    }

    if !seen.contains(initial) {
        checks.push(Validation::fail(DefinitionViolation::InitialStateNotFound {
            name: initial.to_string(),
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}

/// A transition definition bound to one machine.
pub(crate) struct BoundTransition {
    def: TransitionDef,
    machine: MachineHandle,
}

impl BoundTransition {
    pub(crate) fn name(&self) -> &str {
        self.def.name()
    }

    pub(crate) fn target_state(&self) -> &str {
        self.def.target_state()
    }

    pub(crate) fn should_fire(&self) -> bool {
        self.def.should_fire(&self.machine)
    }

    pub(crate) fn init(&self) -> HookResult {
        self.def.init(&self.machine)
    }

    pub(crate) fn enter(&self) -> HookResult {
        self.def.enter(&self.machine)
    }

    pub(crate) fn leave(&self) -> HookResult {
        self.def.leave(&self.machine)
    }

    pub(crate) fn destroy(&self) -> HookResult {
        self.def.destroy()
    }
}

/// A state definition bound to one machine.
pub(crate) struct BoundState {
    def: StateDef,
    machine: MachineHandle,
    transitions: Vec<Rc<BoundTransition>>,
}

impl BoundState {
    fn bind(def: StateDef, machine: &MachineHandle) -> Self {
        let transitions = def
            .transitions()
            .iter()
            .map(|transition| {
                Rc::new(BoundTransition {
                    def: transition.clone(),
                    machine: machine.clone(),
                })
            })
            .collect();

        Self {
            def,
            machine: machine.clone(),
            transitions,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.def.name()
    }

    pub(crate) fn transitions(&self) -> &[Rc<BoundTransition>] {
        &self.transitions
    }

    pub(crate) fn has_custom_heartbeat(&self) -> bool {
        self.def.has_custom_heartbeat()
    }

    pub(crate) fn can_change_state(&self, target: &str) -> bool {
        self.def.can_change_state(&self.machine, target)
    }

    pub(crate) fn init(&self) -> HookResult {
        self.def.init(&self.machine)
    }

    pub(crate) fn enter(&self) -> HookResult {
        self.def.enter(&self.machine)
    }

    pub(crate) fn leave(&self) -> HookResult {
        self.def.leave(&self.machine)
    }

    pub(crate) fn heartbeat(&self, delta_time: f64) -> HookResult {
        self.def.heartbeat(&self.machine, delta_time)
    }

    pub(crate) fn data_changed(&self, change: &DataChange) -> HookResult {
        self.def.data_changed(&self.machine, change)
    }
}

/// States of one machine, indexed by name. Membership is fixed at construction.
pub(crate) struct StateRegistry {
    order: Vec<String>,
    states: HashMap<String, Rc<BoundState>>,
}

impl StateRegistry {
    /// Bind validated definitions to `machine`.
    pub(crate) fn bind(defs: Vec<StateDef>, machine: &MachineHandle) -> Self {
        let mut order = Vec::with_capacity(defs.len());
        let mut states = HashMap::with_capacity(defs.len());

        for def in defs {
            order.push(def.name().to_string());
            states.insert(def.name().to_string(), Rc::new(BoundState::bind(def, machine)));
        }

        let registry = Self { order, states };
        registry.warn_unknown_targets();
        registry
    }

    fn warn_unknown_targets(&self) {
        for state in self.iter() {
            for transition in state.transitions() {
                if !self.contains(transition.target_state()) {
                    warn!(
                        state = state.name(),
                        transition = transition.name(),
                        target = transition.target_state(),
                        "transition targets a state that is not registered"
                    );
                }
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Rc<BoundState>> {
        self.states.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// States in declared order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Rc<BoundState>> {
        self.order.iter().filter_map(|name| self.states.get(name))
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.order
    }
}
