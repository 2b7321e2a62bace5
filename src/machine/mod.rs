//! The running state machine and its collaborators.
//!
//! - `controller`: the [`StateMachine`] itself
//! - `registry`: states bound to one machine
//! - `scheduler`: spawn/defer dispatch of lifecycle hooks with cancellation
//! - `signal`: change notifications
//! - `handle`: the back-reference given to hooks

mod controller;
mod handle;
pub(crate) mod registry;
mod scheduler;
mod signal;

pub use controller::StateMachine;
pub use handle::MachineHandle;
pub use signal::{Connection, DataChanged, Signal, StateChanged};
