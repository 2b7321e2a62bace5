//! Data owned by a machine: the shared key/value store and the
//! state change history.

mod data;
mod history;

pub use data::{DataChange, SharedData};
pub use history::{StateChangeRecord, StateHistory, DEFAULT_HISTORY_LIMIT};
