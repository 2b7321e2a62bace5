//! Builder API for state machine construction.
//!
//! `StateMachineBuilder` is the configuration entry point: initial state,
//! state definitions, seed data, log label and history size.

pub mod error;
pub mod machine;

pub use error::{BuildError, DefinitionViolation};
pub use machine::StateMachineBuilder;
