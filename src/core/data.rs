//! Shared data store owned by a single state machine.
//!
//! Every state and transition bound to a machine sees the same store. Writes
//! through [`SharedData`] are visible machine-wide immediately but do not emit
//! any notification; use `StateMachine::change_data` for notifying writes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Reference-counted key/value store shared by one machine and its definitions.
///
/// Cloning a `SharedData` clones the reference, not the contents. A key whose
/// value is `Value::Null` is treated as absent.
#[derive(Clone, Default)]
pub struct SharedData {
    inner: Rc<RefCell<Map<String, Value>>>,
}

/// A single change made through the notifying mutator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataChange {
    pub key: String,
    pub new_value: Value,
    pub old_value: Value,
}

impl SharedData {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a JSON value.
    ///
    /// Anything other than a JSON object (or `null`) is not a usable mapping:
    /// the store starts empty and a warning is logged.
    pub fn from_value(value: Value) -> Self {
        let data = Self::new();
        data.replace(value);
        data
    }

    /// Replace the whole mapping, bypassing change notification.
    ///
    /// Non-object values reset the store to an empty mapping.
    pub fn replace(&self, value: Value) {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                warn!(
                    kind = value_kind(&other),
                    "shared data is not a mapping, resetting to an empty mapping"
                );
                Map::new()
            }
        };
        *self.inner.borrow_mut() = map;
    }

    /// Read a value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().get(key).cloned()
    }

    /// Read a value by key, treating absence as `null`.
    pub fn get_or_null(&self, key: &str) -> Value {
        self.get(key).unwrap_or(Value::Null)
    }

    /// Write a value directly. No notification is emitted.
    ///
    /// Writing `null` removes the key. Returns the previous value, if any.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        match value.into() {
            Value::Null => self.inner.borrow_mut().remove(&key),
            value => self.inner.borrow_mut().insert(key, value),
        }
    }

    /// Remove a key directly. No notification is emitted.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.borrow_mut().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Keys currently present, in map order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys().cloned().collect()
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.inner.borrow().clone())
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &SharedData) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Store `new_value` under `key` unless it equals the current value.
    ///
    /// Returns the recorded change, or `None` when nothing changed.
    pub(crate) fn swap(&self, key: &str, new_value: Value) -> Option<DataChange> {
        let old_value = self.get_or_null(key);
        if same_value(&old_value, &new_value) {
            return None;
        }
        self.insert(key, new_value.clone());
        Some(DataChange {
            key: key.to_string(),
            new_value,
            old_value,
        })
    }
}

impl fmt::Debug for SharedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.borrow().iter()).finish()
    }
}

/// Value equality where numbers compare by magnitude, so `3` equals `3.0`.
/// Two integers still compare exactly.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => {
            x.as_f64() == y.as_f64()
        }
        _ => a == b,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
