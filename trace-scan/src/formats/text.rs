//! Babeltrace-style text trace reader
//!
//! Lines look like
//!
//! ```text
//! [100] sched_switch: { cpu_id = 0 }, { prev_tid = 1, next_comm = "bash", next_tid = 5 }
//! [1.000000300] (+0.000000200) host sched_switch: { cpu_id = 1 }, { next_tid = 7 }
//! ```
//!
//! The timestamp is either integer nanoseconds or `seconds.fraction`. The
//! header ends at the last colon before the first brace, so UST names like
//! `provider:event` stay whole; the event name is the header's last word. With several brace groups,
//! the last one is the payload and the others are context (`cpu_id` there
//! sets the CPU aspect). Lines that are blank or start with `#` are ignored.

use super::TraceFileParser;
use crate::types::{FieldValue, Result, ScanError, TraceEvent};

/// Parser for `.txt` / `.log` traces
pub struct TextParser;

impl TraceFileParser for TextParser {
    fn parse_line(line: &str, line_no: usize) -> Result<Option<TraceEvent>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let err = |message: &str| ScanError::TraceParseError {
            line: line_no,
            message: message.to_string(),
        };

        let rest = line.strip_prefix('[').ok_or_else(|| err("expected '[timestamp]'"))?;
        let (timestamp, rest) = rest.split_once(']').ok_or_else(|| err("unterminated timestamp"))?;
        let timestamp_ns = parse_timestamp(timestamp.trim()).ok_or_else(|| err("invalid timestamp"))?;

        let body_start = rest.find('{').unwrap_or(rest.len());
        let colon = rest[..body_start].rfind(':').ok_or_else(|| err("expected 'name:'"))?;
        let (header, body) = (&rest[..colon], &rest[colon + 1..]);
        let name = header
            .split_whitespace()
            .last()
            .ok_or_else(|| err("missing event name"))?;

        let groups = split_groups(body).map_err(|m| err(&m))?;
        let mut event = TraceEvent::new(name, timestamp_ns);

        let payload_index = groups.len().saturating_sub(1);
        for (index, group) in groups.iter().enumerate() {
            for (key, value) in parse_group(group).map_err(|m| err(&m))? {
                if index < payload_index && key == "cpu_id" {
                    let cpu = value
                        .as_i64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| err("invalid cpu_id"))?;
                    event.cpu = Some(cpu);
                } else {
                    event.fields.insert(key, value);
                }
            }
        }

        Ok(Some(event))
    }
}

/// Parse `123` (ns) or `1.000000123` (seconds) into nanoseconds
fn parse_timestamp(text: &str) -> Option<i64> {
    let Some((secs, frac)) = text.split_once('.') else {
        return text.parse().ok();
    };

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let (negative, secs) = match secs.strip_prefix('-') {
        Some(magnitude) => (true, magnitude),
        None => (false, secs),
    };
    if !is_digits(secs) || !is_digits(frac) || frac.len() > 9 {
        return None;
    }

    let secs: i64 = secs.parse().ok()?;
    let nanos: i64 = format!("{:0<9}", frac).parse().ok()?;
    let magnitude = secs.checked_mul(1_000_000_000)?.checked_add(nanos)?;
    if negative {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}

/// Split `{ a = 1 }, { b = 2 }` into the inner text of each top-level group
fn split_groups(body: &str) -> std::result::Result<Vec<String>, String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in body.chars() {
        if in_string {
            current.push(c);
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '{' => {
                if depth > 0 {
                    current.push(c);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.checked_sub(1).ok_or("unbalanced '}'")?;
                if depth == 0 {
                    groups.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            _ if depth > 0 => current.push(c),
            ',' => {}
            c if c.is_whitespace() => {}
            c => return Err(format!("unexpected '{}' outside of braces", c)),
        }
    }

    if depth != 0 || in_string {
        return Err("unterminated field group".to_string());
    }
    Ok(groups)
}

/// Split a group's inner text on top-level commas into `key = value` pairs
fn parse_group(group: &str) -> std::result::Result<Vec<(String, FieldValue)>, String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    let flush = |entry: &str, entries: &mut Vec<(String, FieldValue)>| {
        let entry = entry.trim();
        if entry.is_empty() {
            return Ok(());
        }
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected 'key = value', got '{}'", entry))?;
        entries.push((key.trim().to_string(), parse_value(value.trim())));
        Ok::<(), String>(())
    };

    for c in group.chars() {
        if in_string {
            current.push(c);
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                flush(&current, &mut entries)?;
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    flush(&current, &mut entries)?;

    Ok(entries)
}

fn parse_value(text: &str) -> FieldValue {
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return FieldValue::String(inner.replace("\\\"", "\"").replace("\\\\", "\\"));
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if let Ok(v) = i64::from_str_radix(hex, 16) {
            return FieldValue::Integer(v);
        }
    }
    if let Ok(v) = text.parse::<i64>() {
        return FieldValue::Integer(v);
    }
    if let Ok(v) = text.parse::<f64>() {
        return FieldValue::Float(v);
    }
    match text {
        "true" => FieldValue::Boolean(true),
        "false" => FieldValue::Boolean(false),
        _ => FieldValue::String(text.to_string()),
    }
}
