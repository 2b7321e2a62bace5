//! Statecraft: a tick-driven state machine with lifecycle hooks
//!
//! A [`StateMachine`] owns a set of named states, a shared key/value store and
//! a scheduler for lifecycle hooks. The host calls [`StateMachine::tick`] once
//! per frame; each tick evaluates the current state's transitions in declared
//! order and moves to the target of the first one that fires.
//!
//! # Core Concepts
//!
//! - **State**: a [`StateDef`] with enter/leave/heartbeat/data hooks and an
//!   ordered list of transitions
//! - **Transition**: a [`TransitionDef`] pairing a trigger predicate with a
//!   target state
//! - **Shared data**: one [`SharedData`](core::SharedData) store per machine,
//!   visible to every hook through its [`MachineHandle`]
//! - **Scheduler**: hooks run as spawned or deferred tasks, cancelled when
//!   their state is left or the machine is destroyed
//!
//! # Example
//!
//! ```rust
//! use statecraft::{StateDef, StateMachine, TransitionDef};
//! use serde_json::json;
//!
//! let closed = StateDef::builder("Closed")
//!     .transition(
//!         TransitionDef::builder("Open")
//!             .name("Unlock")
//!             .when(|machine| machine.data().get("key") == Some(json!(true)))
//!             .build(),
//!     )
//!     .build();
//! let open = StateDef::builder("Open").build();
//!
//! let door = StateMachine::create("Closed", vec![closed, open], json!({ "key": false })).unwrap();
//! door.state_changed().connect(|change| {
//!     println!("{} -> {}", change.previous_state, change.new_state);
//! });
//!
//! door.change_data("key", true);
//! door.tick(1.0 / 60.0).unwrap();
//!
//! assert_eq!(door.current_state(), "Open");
//! ```

pub mod builder;
pub mod core;
pub mod definition;
pub mod error;
pub mod machine;

// Re-export commonly used types
pub use builder::{BuildError, DefinitionViolation, StateMachineBuilder};
pub use definition::{StateDef, TransitionDef};
pub use error::{HookError, HookResult, MachineError};
pub use machine::{Connection, DataChanged, MachineHandle, Signal, StateChanged, StateMachine};
