//! In-memory state system
//!
//! A time-indexed attribute store. Each attribute holds one ongoing state
//! (start time + value); modifying it closes the previous state as an
//! interval ending one nanosecond before the new start. `close_history`
//! turns every ongoing state into a final interval and marks the history
//! built, which wakes any thread blocked in `wait_until_built`.
//!
//! Handles are cheap clones of a shared, internally locked history, so the
//! analysis can hand the same state system to the scanner and to readers.

mod attribute_tree;
mod persist;

pub use attribute_tree::AttributeTree;

use crate::host::StateSystem;
use crate::types::{Quark, Result, ScanError, StateInterval, StateValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OngoingState {
    start: i64,
    value: StateValue,
}

/// Everything that makes up a state history; this is what gets persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct History {
    start_time: i64,
    end_time: i64,
    attributes: AttributeTree,
    ongoing: Vec<OngoingState>,
    /// Completed intervals per quark, sorted by start time
    intervals: Vec<Vec<StateInterval>>,
    closed: bool,
}

impl History {
    fn new(start_time: i64) -> Self {
        Self {
            start_time,
            end_time: start_time,
            attributes: AttributeTree::new(),
            ongoing: Vec::new(),
            intervals: Vec::new(),
            closed: false,
        }
    }

    fn check_quark(&self, quark: Quark) -> Result<()> {
        if quark < self.ongoing.len() {
            Ok(())
        } else {
            Err(ScanError::AttributeNotFound(format!("quark {}", quark)))
        }
    }

    fn query(&self, timestamp: i64, quark: Quark) -> Result<StateInterval> {
        self.check_quark(quark)?;
        if timestamp < self.start_time || timestamp > self.end_time {
            return Err(ScanError::TimeOutOfRange {
                timestamp,
                start: self.start_time,
                quark,
            });
        }

        let intervals = &self.intervals[quark];
        let idx = intervals.partition_point(|interval| interval.end < timestamp);
        if let Some(interval) = intervals.get(idx) {
            if interval.contains(timestamp) {
                return Ok(interval.clone());
            }
        }

        // Not in a completed interval, so it belongs to the ongoing state
        let ongoing = &self.ongoing[quark];
        Ok(StateInterval {
            quark,
            start: ongoing.start,
            end: self.end_time,
            value: ongoing.value.clone(),
        })
    }
}

struct Shared {
    history: Mutex<History>,
    built: Condvar,
    backing_file: Option<PathBuf>,
}

/// Shared handle to an in-memory state history
#[derive(Clone)]
pub struct InMemoryStateSystem {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for InMemoryStateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateSystem")
            .field("backing_file", &self.shared.backing_file)
            .field("built", &self.is_built())
            .finish()
    }
}

impl InMemoryStateSystem {
    /// Create an empty state system whose history starts at `start_time`
    pub fn new(start_time: i64) -> Self {
        Self::from_history(History::new(start_time), None)
    }

    /// Create an empty state system that is written to `path` when closed
    pub fn with_backing_file(start_time: i64, path: impl Into<PathBuf>) -> Self {
        Self::from_history(History::new(start_time), Some(path.into()))
    }

    /// Load a previously closed history from disk
    ///
    /// The returned state system is already built and accepts no writes.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let mut history = persist::load(path)?;
        if !history.closed {
            return Err(ScanError::Persistence(format!(
                "history in {:?} was never closed",
                path
            )));
        }
        history.attributes.rebuild_index();
        log::info!(
            "Loaded state history {:?} ({} attributes, {}..{})",
            path,
            history.attributes.len(),
            history.start_time,
            history.end_time
        );
        Ok(Self::from_history(history, Some(path.to_path_buf())))
    }

    fn from_history(history: History, backing_file: Option<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                history: Mutex::new(history),
                built: Condvar::new(),
                backing_file,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.shared
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True once `close_history` has run
    pub fn is_built(&self) -> bool {
        self.lock().closed
    }

    /// File the history is persisted to, if any
    pub fn backing_file(&self) -> Option<&Path> {
        self.shared.backing_file.as_deref()
    }

    pub fn start_time(&self) -> i64 {
        self.lock().start_time
    }

    /// Latest timestamp the history knows about
    pub fn current_end_time(&self) -> i64 {
        self.lock().end_time
    }

    /// Number of attributes
    pub fn attribute_count(&self) -> usize {
        self.lock().attributes.len()
    }

    /// Look up an attribute without creating it
    pub fn quark_absolute(&self, path: &[String]) -> Result<Quark> {
        self.lock()
            .attributes
            .quark(path)
            .ok_or_else(|| ScanError::AttributeNotFound(path.join("/")))
    }

    /// Full path of an attribute
    pub fn attribute_path(&self, quark: Quark) -> Option<String> {
        self.lock().attributes.full_path(quark)
    }

    /// State of one attribute at `timestamp`
    pub fn query_single_state(&self, timestamp: i64, quark: Quark) -> Result<StateInterval> {
        self.lock().query(timestamp, quark)
    }

    /// State of every attribute at `timestamp`, indexed by quark
    pub fn query_full_state(&self, timestamp: i64) -> Result<Vec<StateInterval>> {
        let history = self.lock();
        (0..history.ongoing.len())
            .map(|quark| history.query(timestamp, quark))
            .collect()
    }

    /// All completed intervals, ordered by start time then quark
    pub fn intervals(&self) -> Vec<StateInterval> {
        let history = self.lock();
        let mut all: Vec<StateInterval> = history.intervals.iter().flatten().cloned().collect();
        all.sort_by_key(|interval| (interval.start, interval.quark));
        all
    }
}

impl StateSystem for InMemoryStateSystem {
    fn wait_until_built(&self, timeout: Duration) -> bool {
        let history = self.lock();
        if history.closed || timeout.is_zero() {
            return history.closed;
        }
        match self
            .shared
            .built
            .wait_timeout_while(history, timeout, |history| !history.closed)
        {
            Ok((history, _)) => history.closed,
            Err(poisoned) => poisoned.into_inner().0.closed,
        }
    }

    fn quark_absolute_and_add(&self, path: &[String]) -> Result<Quark> {
        let mut history = self.lock();
        let (quark, created) = history.attributes.quark_and_add(path);
        let quark = quark.ok_or_else(|| ScanError::AttributeNotFound(String::new()))?;

        for _ in created {
            let start = history.start_time;
            history.ongoing.push(OngoingState {
                start,
                value: StateValue::Null,
            });
            history.intervals.push(Vec::new());
        }
        Ok(quark)
    }

    fn modify_attribute(&self, timestamp: i64, value: StateValue, quark: Quark) -> Result<()> {
        let mut history = self.lock();
        if history.closed {
            return Err(ScanError::HistoryClosed(history.end_time));
        }
        history.check_quark(quark)?;

        let ongoing_start = history.ongoing[quark].start;
        if timestamp < ongoing_start {
            return Err(ScanError::TimeOutOfRange {
                timestamp,
                start: ongoing_start,
                quark,
            });
        }

        if history.ongoing[quark].value != value {
            if timestamp > ongoing_start {
                let previous = std::mem::replace(
                    &mut history.ongoing[quark],
                    OngoingState {
                        start: timestamp,
                        value,
                    },
                );
                history.intervals[quark].push(StateInterval {
                    quark,
                    start: previous.start,
                    end: timestamp - 1,
                    value: previous.value,
                });
            } else {
                // Same start time: the latest write wins
                history.ongoing[quark].value = value;
            }
        }

        history.end_time = history.end_time.max(timestamp);
        Ok(())
    }

    fn close_history(&self, timestamp: i64) -> Result<()> {
        let mut history = self.lock();
        if history.closed {
            return Err(ScanError::HistoryClosed(history.end_time));
        }

        if let Some((quark, ongoing)) = history
            .ongoing
            .iter()
            .enumerate()
            .find(|(_, ongoing)| ongoing.start > timestamp)
        {
            return Err(ScanError::TimeOutOfRange {
                timestamp,
                start: ongoing.start,
                quark,
            });
        }

        // The handle only becomes built once the closed history is saved
        let mut closed = history.clone();
        let end_time = closed.end_time.max(timestamp);
        for (quark, state) in closed.ongoing.iter().enumerate() {
            closed.intervals[quark].push(StateInterval {
                quark,
                start: state.start,
                end: end_time,
                value: state.value.clone(),
            });
        }
        closed.end_time = end_time;
        closed.closed = true;

        if let Some(path) = &self.shared.backing_file {
            persist::save(path, &closed)?;
        }

        *history = closed;
        log::debug!(
            "State history closed at {} ({} attributes)",
            end_time,
            history.attributes.len()
        );

        drop(history);
        self.shared.built.notify_all();
        Ok(())
    }
}
