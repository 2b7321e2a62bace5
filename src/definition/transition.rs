//! Transition definitions.
//!
//! A transition pairs a trigger predicate with the name of the state it leads
//! to. Definitions are templates: each machine binds its own copy at
//! construction, so one `TransitionDef` can be shared by many machines.

use crate::error::HookResult;
use crate::machine::MachineHandle;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Lifecycle hook receiving the owning machine.
pub type TransitionHook = Rc<dyn Fn(&MachineHandle) -> HookResult>;

/// Predicate evaluated against the owning machine.
pub type TransitionPredicate = Rc<dyn Fn(&MachineHandle) -> bool>;

/// Hook run when the owning machine is destroyed.
pub type DestroyHook = Rc<dyn Fn() -> HookResult>;

/// Overridable hooks of a transition. Unset hooks fall back to the defaults.
#[derive(Clone, Default)]
pub struct TransitionHooks {
    pub(crate) on_init: Option<TransitionHook>,
    pub(crate) on_enter: Option<TransitionHook>,
    pub(crate) on_leave: Option<TransitionHook>,
    pub(crate) on_destroy: Option<DestroyHook>,
    pub(crate) can_change_state: Option<TransitionPredicate>,
    pub(crate) on_data_changed: Option<TransitionPredicate>,
}

/// A named trigger leading to a target state.
#[derive(Clone)]
pub struct TransitionDef {
    name: String,
    target_state: String,
    hooks: TransitionHooks,
}

impl TransitionDef {
    /// Start building a transition to `target_state`.
    pub fn builder(target_state: impl Into<String>) -> TransitionDefBuilder {
        TransitionDefBuilder {
            name: String::new(),
            target_state: target_state.into(),
            hooks: TransitionHooks::default(),
        }
    }

    /// Derive a new definition from this one.
    ///
    /// The builder starts with every field and hook of `self`; anything set on
    /// it replaces the inherited value.
    pub fn extend(&self) -> TransitionDefBuilder {
        TransitionDefBuilder {
            name: self.name.clone(),
            target_state: self.target_state.clone(),
            hooks: self.hooks.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_state(&self) -> &str {
        &self.target_state
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

    pub(crate) fn destroy(&self) -> HookResult {
        self.hooks.on_destroy.as_ref().map_or(Ok(()), |hook| hook())
    }

    /// Guard consulted before the trigger. Defaults to `true`.
    pub fn can_change_state(&self, machine: &MachineHandle) -> bool {
        self.hooks
            .can_change_state
            .as_ref()
            .map_or(true, |guard| guard(machine))
    }

    /// Trigger predicate. Defaults to `false`, so a transition without one
    /// never fires.
    pub fn on_data_changed(&self, machine: &MachineHandle) -> bool {
        self.hooks
            .on_data_changed
            .as_ref()
            .is_some_and(|trigger| trigger(machine))
    }

    /// Whether both the guard and the trigger hold.
    pub fn should_fire(&self, machine: &MachineHandle) -> bool {
        self.can_change_state(machine) && self.on_data_changed(machine)
    }
}

impl fmt::Debug for TransitionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionDef")
            .field("name", &self.name)
            .field("target_state", &self.target_state)
            .finish_non_exhaustive()
    }
}

/// Builder for transition definitions with a fluent API.
pub struct TransitionDefBuilder {
    name: String,
    target_state: String,
    hooks: TransitionHooks,
}

impl TransitionDefBuilder {
    /// Set the transition name. An empty name is replaced with a generated one.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the target state.
    pub fn target(mut self, target_state: impl Into<String>) -> Self {
        self.target_state = target_state.into();
        self
    }

    /// Set the trigger predicate. The transition fires on the first tick
    /// where it returns `true`.
    pub fn when<F>(mut self, trigger: F) -> Self
    where
        F: Fn(&MachineHandle) -> bool + 'static,
    {
        self.hooks.on_data_changed = Some(Rc::new(trigger));
        self
    }

    /// Set the guard predicate.
    ///
    /// Kept for older definitions; new code should fold the condition into
    /// [`when`](Self::when). The guard is still enforced.
    pub fn can_change_state<F>(mut self, guard: F) -> Self
    where
        F: Fn(&MachineHandle) -> bool + 'static,
    {
        self.hooks.can_change_state = Some(Rc::new(guard));
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle) -> HookResult + 'static,
    {
        self.hooks.on_init = Some(Rc::new(hook));
        self
    }

    /// Hook run, deferred, each time the owning state is entered.
    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle) -> HookResult + 'static,
    {
        self.hooks.on_enter = Some(Rc::new(hook));
        self
    }

    /// Hook run each time the owning state is left.
    pub fn on_leave<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineHandle) -> HookResult + 'static,
    {
        self.hooks.on_leave = Some(Rc::new(hook));
        self
    }

    pub fn on_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> HookResult + 'static,
    {
        self.hooks.on_destroy = Some(Rc::new(hook));
        self
    }

    /// Build the transition.
    pub fn build(self) -> TransitionDef {
        let name = if self.name.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.name
        };

        TransitionDef {
            name,
            target_state: self.target_state,
            hooks: self.hooks,
        }
    }
}
