//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use trace_scan::ScanConfig;

/// Directory holding per-trace supplementary files when none is configured
pub const DEFAULT_SUPPLEMENTARY_DIR: &str = ".trace-scan";

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub traces: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Analysis to build; counting mode when absent
    pub name: Option<String>,
    #[serde(default = "default_supplementary_dir")]
    pub supplementary_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name: None,
            supplementary_dir: default_supplementary_dir(),
        }
    }
}

fn default_supplementary_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SUPPLEMENTARY_DIR)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.input.traces.is_empty() {
        bail!("[input] traces must list at least one trace file");
    }
    if config.scan.queue_size == 0 {
        bail!("[scan] queue_size must be at least 1");
    }
    if let Some(name) = &config.analysis.name {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            bail!("[analysis] name {:?} is not a valid file name", name);
        }
    }
    Ok(())
}
