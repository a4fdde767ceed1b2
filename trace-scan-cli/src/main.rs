//! Trace Scan CLI Application
//!
//! Command-line front end for the trace-scan library:
//! - Count events of one type across one or more traces
//! - Build the active-TID state system of a trace and dump its intervals
//! - Drive either mode from a TOML configuration file

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use trace_scan::{Analysis, FileHost, Host, ScanConfig};

mod config;
mod report;

use config::{AppConfig, OutputFormat, DEFAULT_SUPPLEMENTARY_DIR};
use report::{CountReport, StateReport};

/// Trace Scan - Count events and build state from kernel traces
#[derive(Parser, Debug)]
#[command(name = "trace-scan-cli")]
#[command(about = "Scan kernel traces (JSON lines, babeltrace text)", long_about = None)]
#[command(version)]
struct Args {
    /// Trace file(s) to scan (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    trace: Vec<PathBuf>,

    /// Event name to count
    #[arg(long, value_name = "EVENT")]
    count: Option<String>,

    /// Build the state system of this analysis instead of counting
    #[arg(short, long, value_name = "NAME")]
    analysis: Option<String>,

    /// Re-use an already built state system if one exists
    #[arg(long)]
    reuse: bool,

    /// Directory for per-trace supplementary files (state histories)
    #[arg(long, value_name = "DIR")]
    supplementary_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Txt)]
    format: OutputFormat,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Trace Scan CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using trace-scan library v{}", trace_scan::VERSION);

    let app_config = if let Some(config_path) = &args.config {
        log::info!("Loading configuration from: {:?}", config_path);
        config::load_config(config_path)?
    } else if !args.trace.is_empty() {
        config_from_args(&args)
    } else {
        println!("Trace Scan - No input specified");
        println!("\nQuick Start:");
        println!("  trace-scan-cli --trace kernel.txt --count sched_switch");
        println!("  trace-scan-cli --trace kernel.txt --analysis active_tid");
        println!("\nFor configuration files:");
        println!("  trace-scan-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    };

    run(&app_config)
}

/// Build the same configuration a config file would provide
fn config_from_args(args: &Args) -> AppConfig {
    let mut scan = ScanConfig::new().with_use_existing(args.reuse);
    if let Some(event) = &args.count {
        scan = scan.with_count_event(event.clone());
    }

    AppConfig {
        input: config::InputConfig {
            traces: args.trace.clone(),
        },
        scan,
        analysis: config::AnalysisConfig {
            name: args.analysis.clone(),
            supplementary_dir: args
                .supplementary_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUPPLEMENTARY_DIR)),
        },
        output: config::OutputConfig {
            format: args.format,
            path: args.output.clone(),
        },
    }
}

fn run(app_config: &AppConfig) -> Result<()> {
    let rendered = match &app_config.analysis.name {
        Some(name) => state_mode(app_config, name)?,
        None => count_mode(app_config)?,
    };
    write_output(&rendered, app_config.output.path.as_deref())
}

/// Count mode - count target events in every trace, in parallel
fn count_mode(app_config: &AppConfig) -> Result<String> {
    let scan = &app_config.scan;
    log::info!(
        "Counting '{}' events in {} trace(s)",
        scan.count_event,
        app_config.input.traces.len()
    );

    let reports = app_config
        .input
        .traces
        .par_iter()
        .map(|trace| -> Result<CountReport> {
            let host = make_host(app_config, trace);
            let count = trace_scan::run_event_count(&host, "event_count", scan)
                .with_context(|| format!("Failed to scan {:?}", trace))?;
            Ok(CountReport {
                trace: trace.clone(),
                event: scan.count_event.clone(),
                count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    report::render_counts(&reports, app_config.output.format)
}

/// Analysis mode - build the state system of the first trace
fn state_mode(app_config: &AppConfig, name: &str) -> Result<String> {
    let traces = &app_config.input.traces;
    let trace = traces.first().context("No trace to analyse")?;
    if traces.len() > 1 {
        log::warn!("Analysis mode uses only the first trace, ignoring {} other(s)", traces.len() - 1);
    }

    let host = make_host(app_config, trace);
    let summary = trace_scan::run_state_analysis(&host, name, &app_config.scan)
        .with_context(|| format!("Analysis '{}' failed on {:?}", name, trace))?;

    let analysis = host
        .resolve_analysis(name)
        .with_context(|| format!("Analysis '{}' disappeared", name))?;
    let state_system = analysis.state_system(true)?;

    let report = StateReport::new(name, trace.clone(), summary, &state_system);
    report::render_state(&report, app_config.output.format)
}

fn make_host(app_config: &AppConfig, trace: &Path) -> FileHost {
    FileHost::new(&app_config.analysis.supplementary_dir)
        .with_active_trace(trace)
        .with_queue_size(app_config.scan.queue_size)
}

fn write_output(rendered: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write report: {:?}", path))?;
            log::info!("Report written to {:?}", path);
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_trace(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(
            &path,
            "[100] sched_switch: { cpu_id = 0 }, { next_tid = 5 }\n\
             [200] other: { cpu_id = 0 }, { x = 1 }\n\
             [300] sched_switch: { cpu_id = 0 }, { next_tid = 7 }\n",
        )
        .unwrap();
        path
    }

    fn app_config(dir: &Path, traces: Vec<PathBuf>, analysis: Option<&str>) -> AppConfig {
        AppConfig {
            input: config::InputConfig { traces },
            scan: ScanConfig::new(),
            analysis: config::AnalysisConfig {
                name: analysis.map(str::to_string),
                supplementary_dir: dir.join("supp"),
            },
            output: config::OutputConfig::default(),
        }
    }

    #[test]
    fn test_count_mode_over_several_traces() {
        let dir = tempfile::tempdir().unwrap();
        let traces = vec![write_trace(dir.path(), "a.txt"), write_trace(dir.path(), "b.txt")];
        let rendered = count_mode(&app_config(dir.path(), traces, None)).unwrap();
        assert!(rendered.contains("a.txt"));
        assert!(rendered.contains("b.txt"));
        assert!(rendered.lines().last().unwrap().trim_end().ends_with('4'));
    }

    #[test]
    fn test_state_mode_reports_intervals() {
        let dir = tempfile::tempdir().unwrap();
        let traces = vec![write_trace(dir.path(), "a.txt")];
        let rendered = state_mode(&app_config(dir.path(), traces, Some("active_tid")), "active_tid").unwrap();
        assert!(rendered.contains("2 state changes"));
        assert!(rendered.contains("[0]"));
    }

    #[test]
    fn test_count_mode_missing_trace_fails() {
        let dir = tempfile::tempdir().unwrap();
        let traces = vec![dir.path().join("missing.txt")];
        assert!(count_mode(&app_config(dir.path(), traces, None)).is_err());
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from([
            "trace-scan-cli",
            "--trace",
            "k.txt",
            "--count",
            "irq_handler_entry",
            "--reuse",
            "--format",
            "json",
        ]);
        let config = config_from_args(&args);
        assert_eq!(config.scan.count_event, "irq_handler_entry");
        assert!(config.scan.use_existing);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.analysis.supplementary_dir, PathBuf::from(".trace-scan"));
    }
}
