//! Report generation
//!
//! Renders event counts and state-system dumps as plain text tables or JSON.

use crate::config::OutputFormat;
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use trace_scan::{timestamp_from_nanos, IndexSummary, InMemoryStateSystem, StateValue};

/// Number of matching events in one trace
#[derive(Debug, Clone, Serialize)]
pub struct CountReport {
    pub trace: PathBuf,
    pub event: String,
    pub count: u64,
}

/// One state interval of one attribute
#[derive(Debug, Clone, Serialize)]
pub struct IntervalRow {
    pub start: i64,
    pub end: i64,
    pub value: StateValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeReport {
    pub path: String,
    pub intervals: Vec<IntervalRow>,
}

/// Result of building an analysis's state system
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub analysis: String,
    pub trace: PathBuf,
    pub summary: IndexSummary,
    pub attributes: Vec<AttributeReport>,
}

impl StateReport {
    /// Collect every attribute's intervals from a state system
    pub fn new(
        analysis: &str,
        trace: PathBuf,
        summary: IndexSummary,
        state_system: &InMemoryStateSystem,
    ) -> Self {
        let mut attributes: Vec<AttributeReport> = (0..state_system.attribute_count())
            .map(|quark| AttributeReport {
                path: state_system.attribute_path(quark).unwrap_or_default(),
                intervals: Vec::new(),
            })
            .collect();

        for interval in state_system.intervals() {
            if let Some(attribute) = attributes.get_mut(interval.quark) {
                attribute.intervals.push(IntervalRow {
                    start: interval.start,
                    end: interval.end,
                    value: interval.value,
                });
            }
        }

        // Parent attributes like "CPUs" in "CPUs/0" never hold a value
        attributes.retain(|attribute| {
            attribute
                .intervals
                .iter()
                .any(|interval| !interval.value.is_null())
        });

        Self {
            analysis: analysis.to_string(),
            trace,
            summary,
            attributes,
        }
    }
}

fn format_time(timestamp_ns: i64) -> String {
    timestamp_from_nanos(timestamp_ns)
        .format("%H:%M:%S%.9f")
        .to_string()
}

/// Render per-trace counts
pub fn render_counts(reports: &[CountReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
        OutputFormat::Txt => {
            let mut out = String::new();
            let width = reports
                .iter()
                .map(|r| r.trace.display().to_string().len())
                .max()
                .unwrap_or(0)
                .max("Trace".len());

            writeln!(out, "{:<width$}  {:<20}  {:>10}", "Trace", "Event", "Count", width = width)?;
            writeln!(out, "{}", "─".repeat(width + 34))?;
            for report in reports {
                writeln!(
                    out,
                    "{:<width$}  {:<20}  {:>10}",
                    report.trace.display(),
                    report.event,
                    report.count,
                    width = width
                )?;
            }
            if reports.len() > 1 {
                let total: u64 = reports.iter().map(|r| r.count).sum();
                writeln!(out, "{:<width$}  {:<20}  {:>10}", "Total", "", total, width = width)?;
            }
            Ok(out)
        }
    }
}

/// Render a state-system dump
pub fn render_state(report: &StateReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Txt => {
            let mut out = String::new();
            writeln!(out, "Analysis: {}", report.analysis)?;
            writeln!(out, "Trace:    {}", report.trace.display())?;

            let summary = &report.summary;
            if summary.reused {
                writeln!(out, "State system already built, scan skipped")?;
            } else {
                writeln!(
                    out,
                    "Events:   {} processed, {} state changes, {} skipped",
                    summary.events_processed, summary.updates, summary.skipped
                )?;
                match summary.closed_at {
                    Some(end) => writeln!(out, "Closed:   {} ({})", end, format_time(end))?,
                    None => writeln!(out, "Closed:   no events, history left open")?,
                }
            }

            for attribute in &report.attributes {
                writeln!(out, "\n[{}]", attribute.path)?;
                writeln!(out, "  {:>20}  {:>20}  {:<18}  {}", "Start", "End", "Start (UTC)", "Value")?;
                for interval in &attribute.intervals {
                    writeln!(
                        out,
                        "  {:>20}  {:>20}  {:<18}  {}",
                        interval.start,
                        interval.end,
                        format_time(interval.start),
                        interval.value
                    )?;
                }
            }
            Ok(out)
        }
    }
}
