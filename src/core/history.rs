//! State change history tracking.
//!
//! Every completed state change is recorded with a timestamp. The history is
//! bounded: once the limit is reached the oldest record is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of records kept per machine.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Record of a single state change.
///
/// # Example
///
/// ```rust
/// use statecraft::core::StateChangeRecord;
/// use chrono::Utc;
///
/// let record = StateChangeRecord {
///     from: "Idle".to_string(),
///     to: "Active".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, "Active");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChangeRecord {
    /// The state being left
    pub from: String,
    /// The state being entered
    pub to: String,
    /// When the change completed
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded history of state changes.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{StateChangeRecord, StateHistory};
/// use chrono::Utc;
///
/// let mut history = StateHistory::with_limit(8);
/// history.record(StateChangeRecord {
///     from: "Idle".to_string(),
///     to: "Walking".to_string(),
///     timestamp: Utc::now(),
/// });
/// history.record(StateChangeRecord {
///     from: "Walking".to_string(),
///     to: "Running".to_string(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.path(), vec!["Idle", "Walking", "Running"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    records: VecDeque<StateChangeRecord>,
    limit: usize,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHistory {
    /// Create an empty history with the default limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty history keeping at most `limit` records.
    ///
    /// A limit of zero disables recording.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: StateChangeRecord) {
        if self.limit == 0 {
            return;
        }
        if self.records.len() == self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Names of the states traversed: the first recorded origin, then the
    /// target of each record.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front() {
            path.push(first.from.as_str());
        }
        path.extend(self.records.iter().map(|r| r.to.as_str()));
        path
    }

    /// Time between the first and last recorded change.
    ///
    /// Returns `None` if nothing has been recorded.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// The most recent record.
    pub fn latest(&self) -> Option<&StateChangeRecord> {
        self.records.back()
    }

    pub fn records(&self) -> impl Iterator<Item = &StateChangeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
