//! Event scanner
//!
//! Single-pass scans over a trace's events. The counting scan tallies events
//! of one type; the indexing scan turns events of one type into state system
//! updates and closes the history at the last event's timestamp.

use crate::config::ScanConfig;
use crate::host::{Analysis, Event, Host, StateSystem};
use crate::types::{split_attribute_path, Result, ScanError, StateValue};
use serde::Serialize;

/// Outcome of an indexing scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    /// Events consumed from the sequence, of any type
    pub events_processed: u64,
    /// `modify_attribute` calls issued
    pub updates: u64,
    /// Matching events skipped because a required field was missing
    pub skipped: u64,
    /// Timestamp passed to `close_history`, if it was called
    pub closed_at: Option<i64>,
    /// True if the state system was already built and no scan ran
    pub reused: bool,
}

/// Count the events whose name equals `target`
///
/// # Arguments
/// * `events` - Single-pass event sequence
/// * `target` - Event name to count
///
/// # Returns
/// * `Result<u64>` - Number of matching events, or the first read error
pub fn count_events<E, I>(events: I, target: &str) -> Result<u64>
where
    E: Event,
    I: IntoIterator<Item = Result<E>>,
{
    let mut count = 0u64;
    for event in events {
        if event?.name() == target {
            count += 1;
        }
    }
    log::debug!("Counted {} '{}' events", count, target);
    Ok(count)
}

/// Feed matching events into a state system
///
/// For each event named `config.index_event`, the value of
/// `config.attribute_field` becomes the attribute path and the value of
/// `config.value_field` is written as text at the event's timestamp. Events
/// missing either field are skipped. Once the sequence is exhausted the
/// history is closed at the last event's timestamp; an empty sequence leaves
/// the state system untouched.
///
/// # Arguments
/// * `events` - Single-pass event sequence
/// * `state_system` - State system to write into
/// * `config` - Event and field names to use
///
/// # Returns
/// * `Result<IndexSummary>` - Counters for the scan, or the first host error
pub fn index_events<E, I, S>(events: I, state_system: &S, config: &ScanConfig) -> Result<IndexSummary>
where
    E: Event,
    I: IntoIterator<Item = Result<E>>,
    S: StateSystem + ?Sized,
{
    let mut summary = IndexSummary::default();
    let mut last_timestamp = None;

    for event in events {
        let event = event?;
        summary.events_processed += 1;
        last_timestamp = Some(event.timestamp_ns());

        if event.name() != config.index_event {
            continue;
        }

        let attribute = event.field(&config.attribute_field);
        let value = event.field(&config.value_field);
        let (Some(attribute), Some(value)) = (attribute, value) else {
            log::trace!(
                "Skipping '{}' at {}: missing '{}' or '{}'",
                config.index_event,
                event.timestamp_ns(),
                config.attribute_field,
                config.value_field
            );
            summary.skipped += 1;
            continue;
        };

        let path = split_attribute_path(&attribute.to_string());
        if path.is_empty() {
            summary.skipped += 1;
            continue;
        }

        let quark = state_system.quark_absolute_and_add(&path)?;
        state_system.modify_attribute(event.timestamp_ns(), StateValue::Text(value.to_string()), quark)?;
        summary.updates += 1;
    }

    if let Some(timestamp) = last_timestamp {
        state_system.close_history(timestamp)?;
        summary.closed_at = Some(timestamp);
    }

    log::debug!(
        "Indexed {} events: {} updates, {} skipped",
        summary.events_processed,
        summary.updates,
        summary.skipped
    );
    Ok(summary)
}

/// Resolve an analysis, reporting through the host when it is missing
fn resolve_analysis<H: Host>(host: &H, name: &str) -> Result<H::Analysis> {
    match host.resolve_analysis(name) {
        Some(analysis) => Ok(analysis),
        None => {
            host.print(&format!("Trace is null: cannot resolve analysis '{}'", name));
            log::error!("Analysis '{}' could not be resolved", name);
            Err(ScanError::AnalysisNotFound(name.to_string()))
        }
    }
}

/// Count `config.count_event` events in the trace behind an analysis
pub fn run_event_count<H: Host>(host: &H, analysis_name: &str, config: &ScanConfig) -> Result<u64> {
    let analysis = resolve_analysis(host, analysis_name)?;
    log::info!("Counting '{}' events for {}", config.count_event, analysis.name());

    let events = analysis.event_iterator()?;
    count_events(events, &config.count_event)
}

/// Build an analysis's state system from its trace
///
/// The scan only runs if the state system is not already built; a reused,
/// complete history is returned as-is with `reused` set.
///
/// # Arguments
/// * `host` - Environment used to resolve the analysis and print diagnostics
/// * `analysis_name` - Name of the analysis to build
/// * `config` - Scan configuration
///
/// # Returns
/// * `Result<IndexSummary>` - Err(AnalysisNotFound) before any state system
///   call if the analysis cannot be resolved
pub fn run_state_analysis<H: Host>(
    host: &H,
    analysis_name: &str,
    config: &ScanConfig,
) -> Result<IndexSummary> {
    let analysis = resolve_analysis(host, analysis_name)?;
    let state_system = analysis.state_system(config.use_existing)?;

    if state_system.wait_until_built(config.built_timeout()) {
        log::info!("State system for {} already built, skipping scan", analysis.name());
        return Ok(IndexSummary {
            reused: true,
            ..IndexSummary::default()
        });
    }

    log::info!("Building state system for {}", analysis.name());
    let events = analysis.event_iterator()?;
    index_events(events, &state_system, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryStateSystem;
    use crate::types::{FieldValue, TraceEvent};

    fn switch(ts: i64, cpu: &str, next_tid: &str) -> TraceEvent {
        TraceEvent::new("sched_switch", ts)
            .with_field("CPU", FieldValue::String(cpu.into()))
            .with_field("next_tid", FieldValue::String(next_tid.into()))
    }

    fn scenario() -> Vec<Result<TraceEvent>> {
        vec![
            Ok(switch(100, "0", "5")),
            Ok(TraceEvent::new("other", 200)),
            Ok(switch(300, "0", "7")),
        ]
    }

    #[test]
    fn test_count_events() {
        assert_eq!(count_events(scenario(), "sched_switch").unwrap(), 2);
        assert_eq!(count_events(scenario(), "other").unwrap(), 1);
        assert_eq!(count_events(scenario(), "sched_wakeup").unwrap(), 0);
    }

    #[test]
    fn test_count_events_empty() {
        let events: Vec<Result<TraceEvent>> = Vec::new();
        assert_eq!(count_events(events, "sched_switch").unwrap(), 0);
    }

    #[test]
    fn test_count_events_propagates_read_error() {
        let events = vec![
            Ok(switch(100, "0", "5")),
            Err(ScanError::TraceParseError {
                line: 2,
                message: "bad line".into(),
            }),
            Ok(switch(300, "0", "7")),
        ];
        assert!(matches!(
            count_events(events, "sched_switch"),
            Err(ScanError::TraceParseError { line: 2, .. })
        ));
    }

    #[test]
    fn test_index_events_builds_intervals() {
        let ss = InMemoryStateSystem::new(0);
        let summary = index_events(scenario(), &ss, &ScanConfig::new()).unwrap();

        assert_eq!(summary.events_processed, 3);
        assert_eq!(summary.updates, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.closed_at, Some(300));
        assert!(ss.is_built());

        let quark = ss.quark_absolute(&["0".to_string()]).unwrap();
        assert_eq!(ss.query_single_state(50, quark).unwrap().value, StateValue::Null);
        assert_eq!(ss.query_single_state(150, quark).unwrap().value, StateValue::from("5"));
        assert_eq!(ss.query_single_state(300, quark).unwrap().value, StateValue::from("7"));
    }

    #[test]
    fn test_index_events_closes_at_last_event_of_any_type() {
        let ss = InMemoryStateSystem::new(0);
        let mut events = scenario();
        events.push(Ok(TraceEvent::new("sched_wakeup", 450)));

        let summary = index_events(events, &ss, &ScanConfig::new()).unwrap();
        assert_eq!(summary.closed_at, Some(450));
        assert_eq!(ss.current_end_time(), 450);
    }

    #[test]
    fn test_index_events_skips_missing_fields() {
        let ss = InMemoryStateSystem::new(0);
        let events = vec![
            Ok(TraceEvent::new("sched_switch", 100).with_field("next_tid", FieldValue::Integer(4))),
            Ok(TraceEvent::new("sched_switch", 200).with_cpu(1)),
            Ok(TraceEvent::new("sched_switch", 300)
                .with_cpu(1)
                .with_field("next_tid", FieldValue::Integer(8))),
        ];

        let summary = index_events(events, &ss, &ScanConfig::new()).unwrap();
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.closed_at, Some(300));
        assert_eq!(ss.attribute_count(), 1);
    }

    #[test]
    fn test_index_events_empty_sequence_leaves_state_open() {
        let ss = InMemoryStateSystem::new(0);
        let events: Vec<Result<TraceEvent>> = Vec::new();

        let summary = index_events(events, &ss, &ScanConfig::new()).unwrap();
        assert_eq!(summary, IndexSummary::default());
        assert!(!ss.is_built());
    }
}
