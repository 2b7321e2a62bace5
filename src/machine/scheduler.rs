//! Lifecycle scheduler for hook dispatch.
//!
//! Hooks are dispatched as fire-and-forget tasks. A *spawned* task starts
//! immediately; a *deferred* task is queued and runs once the outermost
//! machine operation (the current synchronous step) has finished, before
//! control returns to the host.
//!
//! Every task carries a [`CancellationToken`] checked when the task starts.
//! Tasks belong either to the machine scope, cancelled on destruction, or to
//! the activation scope of the current state, cancelled when the state is left.

use crate::error::HookResult;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{error, trace};

/// Cooperative cancellation flag, optionally chained to a parent.
///
/// A child token reports cancellation when either it or its parent has been
/// cancelled.
#[derive(Clone, Debug, Default)]
pub(crate) struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
    parent: Option<Rc<Cell<bool>>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled together with `self`.
    pub fn child(&self) -> Self {
        Self {
            cancelled: Rc::new(Cell::new(false)),
            parent: Some(self.cancelled.clone()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get() || self.parent.as_ref().is_some_and(|p| p.get())
    }
}

/// Which lifetime a scheduled task belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Lives until the machine is destroyed.
    Machine,
    /// Lives until the current state is left.
    Activation,
}

type Job = Box<dyn FnOnce() -> HookResult>;

struct Task {
    hook: &'static str,
    token: CancellationToken,
    job: Job,
}

pub(crate) struct Scheduler {
    label: String,
    machine: CancellationToken,
    activation: RefCell<CancellationToken>,
    deferred: RefCell<VecDeque<Task>>,
    depth: Cell<usize>,
    flushing: Cell<bool>,
}

impl Scheduler {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        let machine = CancellationToken::new();
        let activation = machine.child();
        Self {
            label: label.into(),
            machine,
            activation: RefCell::new(activation),
            deferred: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
            flushing: Cell::new(false),
        }
    }

    fn token(&self, scope: Scope) -> CancellationToken {
        match scope {
            Scope::Machine => self.machine.clone(),
            Scope::Activation => self.activation.borrow().clone(),
        }
    }

    /// Run `job` now as its own task.
    pub(crate) fn spawn(
        &self,
        scope: Scope,
        hook: &'static str,
        job: impl FnOnce() -> HookResult,
    ) {
        let token = self.token(scope);
        if token.is_cancelled() {
            trace!(machine = %self.label, hook, "skipping cancelled task");
            return;
        }
        self.report(hook, job());
    }

    /// Queue `job` to run after the current step.
    pub(crate) fn defer(
        &self,
        scope: Scope,
        hook: &'static str,
        job: impl FnOnce() -> HookResult + 'static,
    ) {
        let task = Task {
            hook,
            token: self.token(scope),
            job: Box::new(job),
        };
        self.deferred.borrow_mut().push_back(task);
        trace!(machine = %self.label, hook, "deferred task");
    }

    /// Run `f` as one synchronous step. Deferred tasks queued during the
    /// outermost step run when it returns.
    pub(crate) fn step<R>(&self, f: impl FnOnce() -> R) -> R {
        self.depth.set(self.depth.get() + 1);
        let out = f();
        self.depth.set(self.depth.get() - 1);
        if self.depth.get() == 0 {
            self.flush();
        }
        out
    }

    fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some(task) = next else { break };
            if task.token.is_cancelled() {
                trace!(machine = %self.label, hook = task.hook, "skipping cancelled task");
                continue;
            }
            self.report(task.hook, (task.job)());
        }
        self.flushing.set(false);
    }

    /// Cancel every task of the current activation and start a fresh one.
    pub(crate) fn renew_activation(&self) {
        let fresh = self.machine.child();
        let outgoing = self.activation.replace(fresh);
        outgoing.cancel();
        self.deferred.borrow_mut().retain(|task| !task.token.is_cancelled());
    }

    /// Cancel everything and drop all queued work.
    pub(crate) fn shutdown(&self) {
        self.machine.cancel();
        let dropped = {
            let mut deferred = self.deferred.borrow_mut();
            let count = deferred.len();
            deferred.clear();
            count
        };
        trace!(machine = %self.label, dropped, "scheduler shut down");
    }

    pub(crate) fn pending(&self) -> usize {
        self.deferred.borrow().len()
    }

    fn report(&self, hook: &'static str, result: HookResult) {
        if let Err(err) = result {
            error!(machine = %self.label, hook, %err, "hook failed");
        }
    }
}
