//! State history files
//!
//! A closed history is stored as one JSON document next to the trace's other
//! supplementary files.

use super::History;
use crate::types::{Result, ScanError};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub(super) fn save(path: &Path, history: &History) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path).map_err(|e| {
        ScanError::Persistence(format!("Failed to create history file {:?}: {}", path, e))
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, history)?;
    writer.flush()?;

    log::info!("State history written to {:?}", path);
    Ok(())
}

pub(super) fn load(path: &Path) -> Result<History> {
    let file = File::open(path).map_err(|e| {
        ScanError::Persistence(format!("Failed to open history file {:?}: {}", path, e))
    })?;
    let history = serde_json::from_reader(BufReader::new(file))?;
    Ok(history)
}
