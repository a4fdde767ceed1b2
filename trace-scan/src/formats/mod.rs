//! Trace file readers (JSON lines, babeltrace-style text)
//!
//! Both formats are line oriented: every line holds at most one event. Each
//! reader implements [`TraceFileParser`] and is driven by the same lazy
//! [`TraceEventIterator`].

use crate::types::{Result, ScanError, TraceEvent};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod jsonl;
pub mod text;

pub use jsonl::JsonLinesParser;
pub use text::TextParser;

/// Line parser signature shared by all formats
pub type LineParseFn = fn(&str, usize) -> Result<Option<TraceEvent>>;

/// Common trait for all trace file parsers
pub trait TraceFileParser {
    /// Parse a single line (1-based `line_no`)
    ///
    /// Returns `Ok(None)` for lines that carry no event (blank, comments).
    fn parse_line(line: &str, line_no: usize) -> Result<Option<TraceEvent>>;

    /// Open a trace file and return a lazy iterator over its events
    fn parse(path: &Path) -> Result<TraceEventIterator> {
        log::info!("Opening trace file: {:?}", path);
        let file = File::open(path).inspect_err(|e| {
            log::error!("Failed to open trace {:?}: {}", path, e);
        })?;
        Ok(TraceEventIterator::from_reader(
            BufReader::new(file),
            Self::parse_line,
        ))
    }
}

/// Supported trace formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    JsonLines,
    Text,
}

impl TraceFormat {
    /// Determine the trace format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("jsonl") | Some("ndjson") | Some("json") => Ok(TraceFormat::JsonLines),
            Some("txt") | Some("log") => Ok(TraceFormat::Text),
            _ => Err(ScanError::UnsupportedFormat(format!("{:?}", path))),
        }
    }
}

/// Open a trace, picking the parser from the file extension
pub fn open_trace(path: &Path) -> Result<TraceEventIterator> {
    match TraceFormat::from_path(path)? {
        TraceFormat::JsonLines => {
            log::debug!("Detected JSON lines trace");
            JsonLinesParser::parse(path)
        }
        TraceFormat::Text => {
            log::debug!("Detected text trace");
            TextParser::parse(path)
        }
    }
}

/// Timestamp of the first event in a trace, `None` for an empty trace
pub fn trace_start_time(path: &Path) -> Result<Option<i64>> {
    match open_trace(path)?.next() {
        Some(event) => Ok(Some(event?.timestamp_ns)),
        None => Ok(None),
    }
}

/// Iterator over the events of a line-oriented trace
///
/// Stops after the first error.
pub struct TraceEventIterator {
    reader: Box<dyn BufRead + Send>,
    parse_line: LineParseFn,
    line_no: usize,
    buffer: String,
    failed: bool,
}

impl TraceEventIterator {
    /// Read events from any buffered reader
    pub fn from_reader(reader: impl BufRead + Send + 'static, parse_line: LineParseFn) -> Self {
        Self {
            reader: Box::new(reader),
            parse_line,
            line_no: 0,
            buffer: String::new(),
            failed: false,
        }
    }
}

impl Iterator for TraceEventIterator {
    type Item = Result<TraceEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    match (self.parse_line)(self.buffer.trim_end(), self.line_no) {
                        Ok(Some(event)) => return Some(Ok(event)),
                        Ok(None) => continue,
                        Err(e) => {
                            self.failed = true;
                            return Some(Err(e));
                        }
                    }
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
