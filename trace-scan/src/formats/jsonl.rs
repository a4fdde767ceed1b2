//! JSON lines trace reader
//!
//! One event object per line:
//! `{"name": "sched_switch", "ts": 100, "cpu": 0, "fields": {"next_tid": 5}}`

use super::TraceFileParser;
use crate::types::{Result, ScanError, TraceEvent};

/// Parser for `.jsonl` / `.ndjson` / `.json` traces
pub struct JsonLinesParser;

impl TraceFileParser for JsonLinesParser {
    fn parse_line(line: &str, line_no: usize) -> Result<Option<TraceEvent>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| ScanError::TraceParseError {
                line: line_no,
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    #[test]
    fn test_parse_event_line() {
        let event = JsonLinesParser::parse_line(
            r#"{"name":"sched_switch","ts":100,"cpu":2,"fields":{"prev_tid":1,"next_tid":5,"next_comm":"bash"}}"#,
            1,
        )
        .unwrap()
        .unwrap();

        assert_eq!(event.name, "sched_switch");
        assert_eq!(event.timestamp_ns, 100);
        assert_eq!(event.cpu, Some(2));
        assert_eq!(event.fields.len(), 3);
        assert_eq!(event.fields["next_comm"], FieldValue::String("bash".into()));
    }

    #[test]
    fn test_fields_are_optional() {
        let event = JsonLinesParser::parse_line(r#"{"name":"irq","ts":5}"#, 1)
            .unwrap()
            .unwrap();
        assert!(event.fields.is_empty());
        assert_eq!(event.cpu, None);
    }

    #[test]
    fn test_blank_line() {
        assert!(JsonLinesParser::parse_line("   ", 3).unwrap().is_none());
    }

    #[test]
    fn test_missing_timestamp_is_error() {
        let err = JsonLinesParser::parse_line(r#"{"name":"irq"}"#, 7).unwrap_err();
        assert!(matches!(err, ScanError::TraceParseError { line: 7, .. }));
    }
}
