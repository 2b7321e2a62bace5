//! The state machine controller.

use crate::builder::{BuildError, StateMachineBuilder};
use crate::core::{SharedData, StateChangeRecord, StateHistory};
use crate::definition::StateDef;
use crate::error::MachineError;
use crate::machine::handle::MachineHandle;
use crate::machine::registry::{BoundState, StateRegistry};
use crate::machine::scheduler::{Scheduler, Scope};
use crate::machine::signal::{DataChanged, Signal, StateChanged};
use chrono::Utc;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, trace};

#[derive(Default)]
struct Status {
    current: Option<String>,
    /// State whose enter hook is running but which is not yet current.
    entering: Option<String>,
    previous: String,
    /// State observed by the last tick, used to hold back the heartbeat on
    /// the first tick after a change.
    last_ticked: Option<String>,
}

pub(crate) struct MachineInner {
    label: String,
    data: SharedData,
    registry: StateRegistry,
    status: RefCell<Status>,
    destroyed: Cell<bool>,
    transitioning: Cell<bool>,
    leaving: Cell<bool>,
    queued: RefCell<VecDeque<String>>,
    scheduler: Scheduler,
    state_changed: Signal<StateChanged>,
    data_changed: Signal<DataChanged>,
    history: RefCell<StateHistory>,
}

impl MachineInner {
    pub(crate) fn data(&self) -> &SharedData {
        &self.data
    }
}

/// A tick-driven state machine.
///
/// `StateMachine` is a cheap handle: clones refer to the same machine. All
/// hooks run on the calling thread; the machine is neither `Send` nor `Sync`.
///
/// # Example
///
/// ```rust
/// use statecraft::{StateDef, StateMachine, TransitionDef};
/// use serde_json::json;
///
/// let idle = StateDef::builder("Idle").build();
/// let active = StateDef::builder("Active")
///     .transition(
///         TransitionDef::builder("Idle")
///             .when(|machine| machine.data().get("count").and_then(|v| v.as_i64()) >= Some(3))
///             .build(),
///     )
///     .build();
///
/// let machine = StateMachine::create("Idle", vec![idle, active], json!({})).unwrap();
/// machine.change_state("Active").unwrap();
/// machine.change_data("count", 3);
/// machine.tick(1.0 / 60.0).unwrap();
///
/// assert_eq!(machine.current_state(), "Idle");
/// assert_eq!(machine.previous_state(), "Active");
/// ```
#[derive(Clone)]
pub struct StateMachine {
    inner: Rc<MachineInner>,
}

impl StateMachine {
    /// Create a machine in `initial` from `states`, seeded with `data`.
    ///
    /// Fails if state names repeat, if `initial` is not among `states`, or if
    /// a transition is malformed. `data` that is not a JSON object is replaced
    /// by an empty mapping.
    pub fn create(
        initial: &str,
        states: Vec<StateDef>,
        data: Value,
    ) -> Result<Self, BuildError> {
        StateMachineBuilder::new()
            .initial(initial)
            .states(states)
            .data(data)
            .build()
    }

    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::new()
    }

    /// Bind validated definitions and force the initial state.
    pub(crate) fn start(
        initial: &str,
        states: Vec<StateDef>,
        data: SharedData,
        label: String,
        history_limit: usize,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let handle = MachineHandle::new(weak.clone());
            MachineInner {
                scheduler: Scheduler::new(label.clone()),
                label,
                data,
                registry: StateRegistry::bind(states, &handle),
                status: RefCell::new(Status::default()),
                destroyed: Cell::new(false),
                transitioning: Cell::new(false),
                leaving: Cell::new(false),
                queued: RefCell::new(VecDeque::new()),
                state_changed: Signal::new(),
                data_changed: Signal::new(),
                history: RefCell::new(StateHistory::with_limit(history_limit)),
            }
        });
        let machine = Self { inner };

        info!(
            machine = %machine.inner.label,
            states = machine.inner.registry.names().len(),
            initial,
            "state machine created"
        );

        machine.inner.scheduler.step(|| {
            // Changes requested by init hooks queue behind the initial entry.
            machine.inner.transitioning.set(true);
            machine.init_definitions();
            machine.run_transitions(initial);
        });
        machine
    }

    pub(crate) fn from_inner(inner: Rc<MachineInner>) -> Self {
        Self { inner }
    }

    /// A non-owning handle to this machine.
    pub fn handle(&self) -> MachineHandle {
        MachineHandle::new(Rc::downgrade(&self.inner))
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Name of the current state.
    pub fn current_state(&self) -> String {
        self.inner.status.borrow().current.clone().unwrap_or_default()
    }

    /// Name of the state before the last change, or an empty string if the
    /// machine has not changed state yet.
    pub fn previous_state(&self) -> String {
        self.inner.status.borrow().previous.clone()
    }

    /// The machine's shared store. This is a reference, not a copy.
    pub fn data(&self) -> SharedData {
        self.inner.data.clone()
    }

    /// Recent state changes, oldest first.
    pub fn history(&self) -> StateHistory {
        self.inner.history.borrow().clone()
    }

    /// Notifications fired after each state change.
    pub fn state_changed(&self) -> &Signal<StateChanged> {
        &self.inner.state_changed
    }

    /// Notifications fired after each change made through [`change_data`](Self::change_data).
    pub fn data_changed(&self) -> &Signal<DataChanged> {
        &self.inner.data_changed
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.inner.registry.contains(name)
    }

    /// Registered state names in declared order.
    pub fn state_names(&self) -> Vec<String> {
        self.inner.registry.names().to_vec()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Number of deferred hooks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Update one key of the shared store and notify.
    ///
    /// Does nothing if the machine is destroyed or the value is unchanged.
    /// Otherwise the current state's data hook runs and `data_changed` fires.
    /// Setting `null` removes the key.
    pub fn change_data(&self, key: &str, value: impl Into<Value>) {
        let inner = &self.inner;
        if inner.destroyed.get() {
            return;
        }
        let Some(change) = inner.data.swap(key, value.into()) else {
            trace!(machine = %inner.label, key, "data unchanged");
            return;
        };
        debug!(machine = %inner.label, key, "data changed");

        inner.scheduler.step(|| {
            if let Some(state) = self.current_bound() {
                inner
                    .scheduler
                    .spawn(Scope::Activation, "state.on_data_changed", || {
                        state.data_changed(&change)
                    });
            }
            inner.data_changed.fire(&DataChanged {
                data: inner.data.clone(),
                change,
            });
        });
    }

    /// Request a change to `target`.
    ///
    /// Fails if `target` is not registered. Does nothing if the machine is
    /// destroyed, if `target` is the current state, or if the current state's
    /// guard refuses. A request made while another change is in progress is
    /// carried out once that change has completed.
    pub fn change_state(&self, target: &str) -> Result<(), MachineError> {
        let inner = &self.inner;
        if inner.destroyed.get() {
            return Ok(());
        }
        if !inner.registry.contains(target) {
            return Err(MachineError::UnknownState {
                name: target.to_string(),
            });
        }
        if inner.transitioning.get() {
            trace!(machine = %inner.label, target, "queueing state change");
            inner.queued.borrow_mut().push_back(target.to_string());
            return Ok(());
        }
        if self.permits(target) {
            inner.scheduler.step(|| self.run_transitions(target));
        }
        Ok(())
    }

    /// Advance the machine by one host frame.
    ///
    /// Evaluates the current state's transitions in declared order and takes
    /// the first one that fires. The heartbeat hook runs only when the state
    /// was already current on the previous tick.
    pub fn tick(&self, delta_time: f64) -> Result<(), MachineError> {
        if self.inner.destroyed.get() {
            return Ok(());
        }
        self.inner.scheduler.step(|| {
            self.evaluate_transitions()?;
            self.dispatch_heartbeat(delta_time);
            Ok(())
        })
    }

    /// Destroy the machine. Idempotent.
    ///
    /// Runs the current state's leave hook and every transition's destroy
    /// hook, cancels all scheduled work and disconnects all listeners.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return;
        }
        info!(machine = %inner.label, state = %self.current_state(), "destroying state machine");

        if let Some(state) = self.active_bound().filter(|_| !inner.leaving.get()) {
            inner
                .scheduler
                .spawn(Scope::Activation, "state.on_leave", || state.leave());
        }
        for state in inner.registry.iter() {
            for transition in state.transitions() {
                inner
                    .scheduler
                    .spawn(Scope::Machine, "transition.on_destroy", || transition.destroy());
            }
        }

        inner.scheduler.shutdown();
        inner.queued.borrow_mut().clear();
        inner.state_changed.disconnect_all();
        inner.data_changed.disconnect_all();
    }

    fn current_bound(&self) -> Option<Rc<BoundState>> {
        let status = self.inner.status.borrow();
        let name = status.current.as_deref()?;
        self.inner.registry.get(name).cloned()
    }

    /// The state owning the live activation: the one being entered, if any,
    /// otherwise the current one.
    fn active_bound(&self) -> Option<Rc<BoundState>> {
        let status = self.inner.status.borrow();
        let name = status.entering.as_deref().or(status.current.as_deref())?;
        self.inner.registry.get(name).cloned()
    }

    fn permits(&self, target: &str) -> bool {
        let Some(current) = self.current_bound() else {
            return true;
        };
        let allowed = current.can_change_state(target);
        if !allowed {
            debug!(
                machine = %self.inner.label,
                from = current.name(),
                to = target,
                "state refused the change"
            );
        }
        allowed
    }

    fn init_definitions(&self) {
        let scheduler = &self.inner.scheduler;
        for state in self.inner.registry.iter() {
            for transition in state.transitions() {
                scheduler.spawn(Scope::Machine, "transition.on_init", || transition.init());
            }
            scheduler.spawn(Scope::Machine, "state.on_init", || state.init());
        }
    }

    /// Carry out `first`, then every change queued while it ran.
    fn run_transitions(&self, first: &str) {
        let inner = &self.inner;
        inner.transitioning.set(true);
        self.enter_state(first);
        loop {
            let next = inner.queued.borrow_mut().pop_front();
            let Some(next) = next else { break };
            if self.permits(&next) {
                self.enter_state(&next);
            }
        }
        inner.transitioning.set(false);
    }

    fn enter_state(&self, target: &str) {
        let inner = &self.inner;
        if inner.destroyed.get() {
            return;
        }
        let previous = inner.status.borrow().current.clone();
        if previous.as_deref() == Some(target) {
            trace!(machine = %inner.label, state = target, "ignoring change to the current state");
            return;
        }
        let Some(next) = inner.registry.get(target).cloned() else {
            return;
        };

        if let Some(outgoing) = self.current_bound() {
            inner.leaving.set(true);
            inner
                .scheduler
                .spawn(Scope::Activation, "state.on_leave", || outgoing.leave());
            for transition in outgoing.transitions() {
                inner
                    .scheduler
                    .spawn(Scope::Activation, "transition.on_leave", || transition.leave());
            }
            inner.leaving.set(false);
        }
        inner.scheduler.renew_activation();
        if inner.destroyed.get() {
            return;
        }
        inner.status.borrow_mut().entering = Some(target.to_string());

        for transition in next.transitions() {
            let transition = Rc::clone(transition);
            inner
                .scheduler
                .defer(Scope::Activation, "transition.on_enter", move || transition.enter());
        }
        inner
            .scheduler
            .spawn(Scope::Activation, "state.on_enter", || next.enter());

        {
            let mut status = inner.status.borrow_mut();
            status.entering = None;
            status.current = Some(target.to_string());
            if let Some(name) = &previous {
                status.previous = name.clone();
            }
        }

        let Some(previous) = previous else {
            debug!(machine = %inner.label, state = target, "entered initial state");
            return;
        };
        inner.history.borrow_mut().record(StateChangeRecord {
            from: previous.clone(),
            to: target.to_string(),
            timestamp: Utc::now(),
        });
        debug!(machine = %inner.label, from = %previous, to = target, "state changed");
        inner.state_changed.fire(&StateChanged {
            new_state: target.to_string(),
            previous_state: previous,
        });
    }

    fn evaluate_transitions(&self) -> Result<(), MachineError> {
        let Some(state) = self.current_bound() else {
            return Ok(());
        };
        let fired = state.transitions().iter().find(|t| t.should_fire());
        if let Some(transition) = fired {
            debug!(
                machine = %self.inner.label,
                state = state.name(),
                transition = transition.name(),
                target = transition.target_state(),
                "transition fired"
            );
            self.change_state(transition.target_state())?;
        }
        Ok(())
    }

    fn dispatch_heartbeat(&self, delta_time: f64) {
        if self.inner.destroyed.get() {
            return;
        }
        let settled = {
            let mut status = self.inner.status.borrow_mut();
            let settled = status.current.is_some() && status.last_ticked == status.current;
            status.last_ticked = status.current.clone();
            settled
        };
        if !settled {
            trace!(machine = %self.inner.label, "first tick in state, holding heartbeat");
            return;
        }
        if let Some(state) = self.current_bound().filter(|s| s.has_custom_heartbeat()) {
            self.inner
                .scheduler
                .spawn(Scope::Activation, "state.on_heartbeat", || {
                    state.heartbeat(delta_time)
                });
        }
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("label", &self.inner.label)
            .field("current", &self.current_state())
            .field("previous", &self.previous_state())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
