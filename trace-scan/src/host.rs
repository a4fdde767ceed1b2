//! Host capability traits
//!
//! The scanner never constructs traces or state systems itself. It is handed
//! a [`Host`] and works only through the capabilities below, so any host that
//! implements them (the file-backed one in [`crate::analysis`], or a fake in
//! tests) is compatible.

use crate::types::{FieldValue, Quark, Result, StateValue, TraceEvent};
use std::time::Duration;

/// Read-only view of a trace event
pub trait Event {
    /// Event type name
    fn name(&self) -> &str;

    /// Timestamp in nanoseconds
    fn timestamp_ns(&self) -> i64;

    /// Value of a named field, or `None` if the event does not carry it
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl Event for TraceEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match self.fields.get(name) {
            Some(value) => Some(value.clone()),
            None => self.aspect(name),
        }
    }
}

/// Time-indexed attribute store that the indexing scan writes into
pub trait StateSystem {
    /// Block until the state system is fully built or `timeout` expires
    ///
    /// Returns true if the state system is built.
    fn wait_until_built(&self, timeout: Duration) -> bool;

    /// Resolve an attribute path to its quark, creating missing attributes
    fn quark_absolute_and_add(&self, path: &[String]) -> Result<Quark>;

    /// Set the value of an attribute starting at `timestamp`
    fn modify_attribute(&self, timestamp: i64, value: StateValue, quark: Quark) -> Result<()>;

    /// Close every ongoing state at `timestamp` and mark the history built
    fn close_history(&self, timestamp: i64) -> Result<()>;
}

/// A named analysis bound to a trace
pub trait Analysis {
    type Event: Event;
    type StateSystem: StateSystem;
    type Events: Iterator<Item = Result<Self::Event>>;

    /// Analysis name
    fn name(&self) -> &str;

    /// Get the analysis's state system
    ///
    /// With `use_existing`, a previously built state system may be returned
    /// instead of a fresh one.
    fn state_system(&self, use_existing: bool) -> Result<Self::StateSystem>;

    /// Start reading the trace and return a single-pass event sequence
    fn event_iterator(&self) -> Result<Self::Events>;
}

/// The environment a scan runs in
pub trait Host {
    type Analysis: Analysis;

    /// Look up an analysis by name, `None` if it cannot be resolved
    fn resolve_analysis(&self, name: &str) -> Option<Self::Analysis>;

    /// Emit a diagnostic message
    fn print(&self, message: &str);
}
