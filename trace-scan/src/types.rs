//! Core types for the trace scanner library
//!
//! This module defines the events read from traces, the values stored in a
//! state system, and the error type shared by every operation in the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Human-readable timestamp type used in reports
pub type Timestamp = DateTime<Utc>;

/// Result type for scanner operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Integer index of an attribute in a state system
pub type Quark = usize;

/// Convert a nanosecond timestamp to `DateTime<Utc>`
pub fn timestamp_from_nanos(timestamp_ns: i64) -> Timestamp {
    DateTime::from_timestamp_nanos(timestamp_ns)
}

/// Errors that can occur while reading traces or building state
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    #[error("State system unavailable for analysis {0}")]
    StateSystemUnavailable(String),

    #[error("Timestamp {timestamp} is before the current state start {start} (attribute {quark})")]
    TimeOutOfRange {
        timestamp: i64,
        start: i64,
        quark: Quark,
    },

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("State history already closed at {0}")]
    HistoryClosed(i64),

    #[error("Failed to parse trace at line {line}: {message}")]
    TraceParseError { line: usize, message: String },

    #[error("Unsupported trace format: {0}")]
    UnsupportedFormat(String),

    #[error("Trace reader failed: {0}")]
    ReaderFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A value carried by an event field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl FieldValue {
    /// Convert to i64 if the value is numeric
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Float(v) => Some(*v as i64),
            FieldValue::Boolean(v) => Some(if *v { 1 } else { 0 }),
            FieldValue::String(v) => v.parse().ok(),
        }
    }
}

/// A single trace event
///
/// Events are produced by the trace readers (or by any other host) and only
/// read by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Event type name (e.g. "sched_switch")
    pub name: String,
    /// Timestamp in nanoseconds
    #[serde(rename = "ts")]
    pub timestamp_ns: i64,
    /// CPU the event was recorded on, if the trace provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    /// Event payload fields
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl TraceEvent {
    /// Create an event with no fields
    pub fn new(name: impl Into<String>, timestamp_ns: i64) -> Self {
        Self {
            name: name.into(),
            timestamp_ns,
            cpu: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder method: set the CPU aspect
    pub fn with_cpu(mut self, cpu: u32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Builder method: add a payload field
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Convert the timestamp to `DateTime<Utc>`
    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_nanos(self.timestamp_ns)
    }

    /// Resolve a well-known aspect by name
    ///
    /// Used when a requested field is not part of the payload, so that
    /// columns like "CPU" can be read the same way as content fields.
    pub fn aspect(&self, name: &str) -> Option<FieldValue> {
        match name {
            "CPU" => self.cpu.map(|cpu| FieldValue::Integer(i64::from(cpu))),
            "Event type" => Some(FieldValue::String(self.name.clone())),
            "Timestamp" | "Timestamp ns" => Some(FieldValue::Integer(self.timestamp_ns)),
            _ => None,
        }
    }
}

/// A value stored in a state system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StateValue {
    #[default]
    Null,
    Integer(i64),
    Text(String),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Integer(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => write!(f, "null"),
            StateValue::Integer(v) => write!(f, "{}", v),
            StateValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// A closed range of time during which an attribute held one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInterval {
    pub quark: Quark,
    pub start: i64,
    pub end: i64,
    pub value: StateValue,
}

impl StateInterval {
    /// Check whether `timestamp` falls inside this interval
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Split an attribute path string into its segments
///
/// Empty segments are dropped, so "0", "/0" and "0/" all map to `["0"]`.
pub fn split_attribute_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
