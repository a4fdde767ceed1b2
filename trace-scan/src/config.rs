//! Scanner configuration types
//!
//! This module defines the small set of knobs the scanner needs. Everything
//! the scripts used to hard-code (event name, field names) lives here so a
//! host or CLI can override it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Event name counted and indexed by default
pub const DEFAULT_EVENT_NAME: &str = "sched_switch";

/// Field whose value becomes the attribute path
pub const DEFAULT_ATTRIBUTE_FIELD: &str = "CPU";

/// Field whose value is written into the state system
pub const DEFAULT_VALUE_FIELD: &str = "next_tid";

/// Capacity of the queue between the trace reader and the scanner
pub const DEFAULT_QUEUE_SIZE: usize = 127;

/// Configuration for a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Event name counted by the counting scan
    #[serde(default = "default_event_name")]
    pub count_event: String,

    /// Event name that triggers a state update in the indexing scan
    #[serde(default = "default_event_name")]
    pub index_event: String,

    /// Field read to derive the attribute path
    #[serde(default = "default_attribute_field")]
    pub attribute_field: String,

    /// Field read to derive the stored value
    #[serde(default = "default_value_field")]
    pub value_field: String,

    /// Re-use a previously persisted state system instead of rebuilding it
    #[serde(default)]
    pub use_existing: bool,

    /// How long to wait for a state system to report itself built (ms)
    #[serde(default)]
    pub built_timeout_ms: u64,

    /// Capacity of the event queue fed by the trace reader
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_event_name() -> String {
    DEFAULT_EVENT_NAME.to_string()
}

fn default_attribute_field() -> String {
    DEFAULT_ATTRIBUTE_FIELD.to_string()
}

fn default_value_field() -> String {
    DEFAULT_VALUE_FIELD.to_string()
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            count_event: default_event_name(),
            index_event: default_event_name(),
            attribute_field: default_attribute_field(),
            value_field: default_value_field(),
            use_existing: false,
            built_timeout_ms: 0,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl ScanConfig {
    /// Create a new scan configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the event name counted by the counting scan
    pub fn with_count_event(mut self, name: impl Into<String>) -> Self {
        self.count_event = name.into();
        self
    }

    /// Builder method: set the event name indexed by the indexing scan
    pub fn with_index_event(mut self, name: impl Into<String>) -> Self {
        self.index_event = name.into();
        self
    }

    /// Builder method: set the attribute and value field names
    pub fn with_fields(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute_field = attribute.into();
        self.value_field = value.into();
        self
    }

    /// Builder method: re-use an existing state system
    pub fn with_use_existing(mut self, enabled: bool) -> Self {
        self.use_existing = enabled;
        self
    }

    /// Builder method: set the built-check timeout
    pub fn with_built_timeout(mut self, timeout: Duration) -> Self {
        self.built_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set the event queue capacity (at least 1)
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size.max(1);
        self
    }

    /// Built-check timeout as a `Duration`
    pub fn built_timeout(&self) -> Duration {
        Duration::from_millis(self.built_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_defaults() {
        let config = ScanConfig::new();
        assert_eq!(config.count_event, "sched_switch");
        assert_eq!(config.index_event, "sched_switch");
        assert_eq!(config.attribute_field, "CPU");
        assert_eq!(config.value_field, "next_tid");
        assert!(!config.use_existing);
        assert_eq!(config.built_timeout(), Duration::ZERO);
        assert_eq!(config.queue_size, 127);
    }

    #[test]
    fn test_scan_config_builder() {
        let config = ScanConfig::new()
            .with_count_event("irq_handler_entry")
            .with_index_event("sched_wakeup")
            .with_fields("target_cpu", "tid")
            .with_use_existing(true)
            .with_built_timeout(Duration::from_millis(250))
            .with_queue_size(0);

        assert_eq!(config.count_event, "irq_handler_entry");
        assert_eq!(config.index_event, "sched_wakeup");
        assert_eq!(config.attribute_field, "target_cpu");
        assert_eq!(config.value_field, "tid");
        assert!(config.use_existing);
        assert_eq!(config.built_timeout_ms, 250);
        assert_eq!(config.queue_size, 1);
    }

    #[test]
    fn test_scan_config_partial_deserialization() {
        let config: ScanConfig = serde_json::from_str(r#"{"count_event":"exit_syscall"}"#).unwrap();
        assert_eq!(config.count_event, "exit_syscall");
        assert_eq!(config.index_event, "sched_switch");
        assert_eq!(config.queue_size, 127);
    }
}
