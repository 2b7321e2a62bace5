//! State definitions.
//!
//! A state bundles lifecycle hooks with an ordered list of transitions. Like
//! transitions, state definitions are templates that each machine binds to
//! itself at construction.

use crate::core::DataChange;
use crate::definition::transition::TransitionDef;
use crate::error::HookResult;
use crate::machine::MachineHandle;
use std::fmt;
use std::rc::Rc;

/// Lifecycle hook receiving the owning machine.
pub type StateHook = Rc<dyn Fn(&MachineHandle) -> HookResult>;

/// Per-tick hook receiving the owning machine and the frame delta in seconds.
pub type HeartbeatHook = Rc<dyn Fn(&MachineHandle, f64) -> HookResult>;

/// Hook receiving each notifying data change made while the state is current.
pub type DataChangedHook = Rc<dyn Fn(&MachineHandle, &DataChange) -> HookResult>;

/// Guard deciding whether the state may be left for the named target.
pub type StateGuard = Rc<dyn Fn(&MachineHandle, &str) -> bool>;

/// Overridable hooks of a state. Unset hooks fall back to the defaults.
#[derive(Clone, Default)]
pub struct StateHooks {
    pub(crate) on_init: Option<StateHook>,
    pub(crate) on_enter: Option<StateHook>,
    pub(crate) on_leave: Option<StateHook>,
    pub(crate) on_heartbeat: Option<HeartbeatHook>,
    pub(crate) on_data_changed: Option<DataChangedHook>,
    pub(crate) can_change_state: Option<StateGuard>,
}

/// A named state with hooks and ordered transitions.
///
/// # Example
///
/// ```rust
/// use statecraft::{StateDef, TransitionDef};
///
/// let idle = StateDef::builder("Idle")
///     .transition(
///         TransitionDef::builder("Moving")
///             .when(|machine| machine.data().get("speed").is_some())
///             .build(),
///     )
///     .on_enter(|_| Ok(()))
///     .build();
///
/// assert_eq!(idle.name(), "Idle");
/// assert_eq!(idle.transitions().len(), 1);
/// assert!(!idle.has_custom_heartbeat());
/// ```
#[derive(Clone)]
pub struct StateDef {
    name: String,
    transitions: Vec<TransitionDef>,
    hooks: StateHooks,
}

impl StateDef {
    /// Start building a state named `name`.
    pub fn builder(name: impl Into<String>) -> StateDefBuilder {
        StateDefBuilder {
            name: name.into(),
            transitions: Vec::new(),
            hooks: StateHooks::default(),
        }
    }

    /// Derive a new definition from this one.
    ///
    /// The builder starts with the name, transitions and hooks of `self`;
    /// anything set on it replaces the inherited value.
    pub fn extend(&self) -> StateDefBuilder {
        StateDefBuilder {
            name: self.name.clone(),
            transitions: self.transitions.clone(),
            hooks: self.hooks.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transitions in declared order.
    pub fn transitions(&self) -> &[TransitionDef] {
        &self.transitions
    }

    /// Whether a heartbeat hook was supplied. Ticks only schedule heartbeat
    /// work for states where this is `true`.
    pub fn has_custom_heartbeat(&self) -> bool {
        self.hooks.on_heartbeat.is_some()
    }

    pub(crate) fn init(&self, machine: &MachineHandle) -> HookResult {
        self.hooks.on_init.as_ref().map_or(Ok(()), |hook| hook(machine))
    }

    pub(crate) fn enter(&self, machine: &MachineHandle) -> HookResult {
        self.hooks.on_enter.as_ref().map_or(Ok(()), |hook| hook(machine))
    }

    pub(crate) fn leave(&self, machine: &MachineHandle) -> HookResult {
        self.hooks.on_leave.as_ref().map_or(Ok(()), |hook| hook(machine))
    }

    pub(crate) fn heartbeat(&self, machine: &MachineHandle, delta_time: f64) -> HookResult {
        self.hooks
            .on_heartbeat
            .as_ref()
            .map_or(Ok(()), |hook| hook(machine, delta_time))
    }

    pub(crate) fn data_changed(&self, machine: &MachineHandle, change: &DataChange) -> HookResult {
        self.hooks
            .on_data_changed
            .as_ref()
            .map_or(Ok(()), |hook| hook(machine, change))
    }

    /// Whether this state may be left for `target`. Defaults to `true`.
    pub fn can_change_state(&self, machine: &MachineHandle, target: &str) -> bool {
        self.hooks
            .can_change_state
            .as_ref()
            .map_or(true, |guard| guard(machine, target))
    }
}

impl fmt::Debug for StateDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDef")
            .field("name", &self.name)
            .field("transitions", &self.transitions)
            .field("has_custom_heartbeat", &self.has_custom_heartbeat())
            .finish_non_exhaustive()
    }
}

/// Builder for state definitions with a fluent API.
pub struct StateDefBuilder {
    name: String,
    transitions: Vec<TransitionDef>,
    hooks: StateHooks,
}

impl StateDefBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a transition after the existing ones.
    pub fn transition(mut self, transition: TransitionDef) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Replace the transition list, including any inherited one.
    pub fn transitions(mut self, transitions: Vec<TransitionDef>) -> Self {
        self.transitions = transitions;
        self
    }

    /// Hook run once when the owning machine is created.
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle) -> HookResult + 'static,
    {
        self.hooks.on_init = Some(Rc::new(hook));
        self
    }

    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle) -> HookResult + 'static,
    {
        self.hooks.on_enter = Some(Rc::new(hook));
        self
    }

    pub fn on_leave<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle) -> HookResult + 'static,
    {
        self.hooks.on_leave = Some(Rc::new(hook));
        self
    }

    /// Hook run on every settled tick while the state is current.
    pub fn on_heartbeat<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle, f64) -> HookResult + 'static,
    {
        self.hooks.on_heartbeat = Some(Rc::new(hook));
        self
    }

    pub fn on_data_changed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle, &DataChange) -> HookResult + 'static,
    {
        self.hooks.on_data_changed = Some(Rc::new(hook));
        self
    }

    /// Guard consulted by `change_state` while this state is current.
    pub fn can_change_state<F>(mut self, guard: F) -> Self
    where
        F: Fn(&MachineHandle, &str) -> bool + 'static,
    {
        self.hooks.can_change_state = Some(Rc::new(guard));
        self
    }

    pub fn build(self) -> StateDef {
        StateDef {
            name: self.name,
            transitions: self.transitions,
            hooks: self.hooks,
        }
    }
}
