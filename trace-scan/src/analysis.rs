//! File-backed host
//!
//! [`FileHost`] resolves analyses against the active trace file.
//! [`ScriptedAnalysis`] owns the analysis's state system (persisted as
//! `<name>.ht` in the trace's supplementary directory) and feeds events to
//! the scanner from a background reader thread through a bounded queue.

use crate::config::DEFAULT_QUEUE_SIZE;
use crate::formats::{open_trace, trace_start_time};
use crate::host::{Analysis, Host};
use crate::state::InMemoryStateSystem;
use crate::types::{Result, ScanError, TraceEvent};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

/// Extension of persisted state history files
pub const STATE_SYSTEM_EXTENSION: &str = "ht";

/// An analysis bound to one trace file
pub struct ScriptedAnalysis {
    name: String,
    trace: PathBuf,
    supplementary_dir: PathBuf,
    queue_size: usize,
    state_system: Mutex<Option<InMemoryStateSystem>>,
}

impl ScriptedAnalysis {
    /// Create an analysis named `name` for `trace`
    pub fn new(trace: impl Into<PathBuf>, name: impl Into<String>, supplementary_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            trace: trace.into(),
            supplementary_dir: supplementary_dir.into(),
            queue_size: DEFAULT_QUEUE_SIZE,
            state_system: Mutex::new(None),
        }
    }

    /// Builder method: set the event queue capacity
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size.max(1);
        self
    }

    pub fn trace(&self) -> &Path {
        &self.trace
    }

    /// File the analysis's state history is persisted to
    pub fn history_file(&self) -> PathBuf {
        self.supplementary_dir
            .join(format!("{}.{}", self.name, STATE_SYSTEM_EXTENSION))
    }

    fn create_state_system(&self, use_existing: bool) -> Result<InMemoryStateSystem> {
        let history_file = self.history_file();

        // An existing file is assumed complete; its range is not checked
        // against the trace
        if use_existing && history_file.exists() {
            match InMemoryStateSystem::open_existing(&history_file) {
                Ok(state_system) => return Ok(state_system),
                Err(e) => log::warn!("Ignoring unreadable history {:?}: {}", history_file, e),
            }
        }

        fs::create_dir_all(&self.supplementary_dir).map_err(|e| {
            log::error!("Cannot create {:?}: {}", self.supplementary_dir, e);
            ScanError::StateSystemUnavailable(self.name.clone())
        })?;

        let start_time = trace_start_time(&self.trace)?.unwrap_or(0);
        log::debug!("New state system for {} starting at {}", self.name, start_time);
        Ok(InMemoryStateSystem::with_backing_file(start_time, history_file))
    }
}

impl Analysis for ScriptedAnalysis {
    type Event = TraceEvent;
    type StateSystem = InMemoryStateSystem;
    type Events = EventFeed;

    fn name(&self) -> &str {
        &self.name
    }

    fn state_system(&self, use_existing: bool) -> Result<InMemoryStateSystem> {
        let mut cached = self
            .state_system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(state_system) = cached.as_ref() {
            return Ok(state_system.clone());
        }

        let state_system = self.create_state_system(use_existing)?;
        *cached = Some(state_system.clone());
        Ok(state_system)
    }

    fn event_iterator(&self) -> Result<EventFeed> {
        EventFeed::spawn(&self.trace, self.queue_size)
    }
}

/// Events delivered by a background reader thread
///
/// `next` blocks until the reader has produced the next event. The sequence
/// ends when the reader reaches the end of the trace; a read error is
/// delivered as an `Err` item and ends it too.
pub struct EventFeed {
    receiver: Receiver<Result<TraceEvent>>,
    reader: Option<JoinHandle<()>>,
}

impl EventFeed {
    /// Open `trace` and start reading it into a queue of `queue_size` events
    pub fn spawn(trace: &Path, queue_size: usize) -> Result<Self> {
        let events = open_trace(trace)?;
        let (sender, receiver) = mpsc::sync_channel(queue_size);
        let trace_name = trace.display().to_string();

        let reader = thread::Builder::new()
            .name("trace-reader".to_string())
            .spawn(move || {
                let mut delivered = 0u64;
                for event in events {
                    if sender.send(event).is_err() {
                        log::debug!("Event consumer for {} went away", trace_name);
                        return;
                    }
                    delivered += 1;
                }
                log::debug!("Finished reading {} ({} items)", trace_name, delivered);
            })?;

        Ok(Self {
            receiver,
            reader: Some(reader),
        })
    }
}

impl Iterator for EventFeed {
    type Item = Result<TraceEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.receiver.recv() {
            Ok(event) => Some(event),
            Err(_) => {
                let reader = self.reader.take()?;
                match reader.join() {
                    Ok(()) => None,
                    Err(_) => Some(Err(ScanError::ReaderFailed(
                        "trace reader thread panicked".to_string(),
                    ))),
                }
            }
        }
    }
}

/// Host that resolves analyses against the active trace file
pub struct FileHost {
    active_trace: Option<PathBuf>,
    supplementary_root: PathBuf,
    queue_size: usize,
}

impl FileHost {
    /// Create a host with no active trace
    ///
    /// Each trace gets its own supplementary directory under
    /// `supplementary_root`, named after the trace file and keyed on its
    /// canonical path.
    pub fn new(supplementary_root: impl Into<PathBuf>) -> Self {
        Self {
            active_trace: None,
            supplementary_root: supplementary_root.into(),
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }

    /// Builder method: set the active trace
    pub fn with_active_trace(mut self, trace: impl Into<PathBuf>) -> Self {
        self.active_trace = Some(trace.into());
        self
    }

    /// Builder method: set the event queue capacity of created analyses
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size.max(1);
        self
    }

    pub fn active_trace(&self) -> Option<&Path> {
        self.active_trace.as_deref()
    }

    /// Supplementary directory used for `trace`
    ///
    /// `<root>/<file name>-<hash>`, where the hash is taken over the
    /// canonical path so same-named traces in different directories never
    /// share state histories.
    pub fn supplementary_dir(&self, trace: &Path) -> PathBuf {
        let trace_name = trace
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trace".to_string());
        let canonical = fs::canonicalize(trace).unwrap_or_else(|_| trace.to_path_buf());

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());

        self.supplementary_root
            .join(format!("{}-{}", trace_name, &digest[..16]))
    }
}

impl Host for FileHost {
    type Analysis = ScriptedAnalysis;

    fn resolve_analysis(&self, name: &str) -> Option<ScriptedAnalysis> {
        let trace = self.active_trace.as_ref()?;
        log::debug!("Resolving analysis {} for {:?}", name, trace);
        Some(
            ScriptedAnalysis::new(trace.clone(), name, self.supplementary_dir(trace))
                .with_queue_size(self.queue_size),
        )
    }

    fn print(&self, message: &str) {
        println!("{}", message);
    }
}
