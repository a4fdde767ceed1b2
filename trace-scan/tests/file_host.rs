// End-to-end scans over trace files on disk
use std::fs;
use std::path::{Path, PathBuf};

use trace_scan::{
    run_event_count, run_state_analysis, split_attribute_path, Analysis, FileHost, Host,
    InMemoryStateSystem, ScanConfig, ScanError, StateSystem, StateValue,
};

const KERNEL_TRACE: &str = r#"# cpu-tagged kernel trace
[100] sched_switch: { cpu_id = 0 }, { prev_comm = "swapper/0", prev_tid = 0, next_comm = "bash", next_tid = 5 }
[150] sched_wakeup: { cpu_id = 1 }, { comm = "sshd", tid = 12, target_cpu = 1 }
[200] sched_switch: { cpu_id = 1 }, { prev_comm = "swapper/1", prev_tid = 0, next_comm = "sshd", next_tid = 12 }
[300] sched_switch: { cpu_id = 0 }, { prev_comm = "bash", prev_tid = 5, next_comm = "vim", next_tid = 7 }
[350] irq_handler_entry: { cpu_id = 1 }, { irq = 16, name = "eth0" }
"#;

fn write_trace(dir: &Path) -> PathBuf {
    let path = dir.join("kernel.txt");
    fs::write(&path, KERNEL_TRACE).unwrap();
    path
}

#[test]
fn test_count_sched_switch_in_text_trace() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path());
    let host = FileHost::new(dir.path().join("supp")).with_active_trace(&trace);

    let count = run_event_count(&host, "count", &ScanConfig::new()).unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_active_tid_analysis_builds_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path());
    let host = FileHost::new(dir.path().join("supp")).with_active_trace(&trace);

    let summary = run_state_analysis(&host, "active_tid", &ScanConfig::new()).unwrap();
    assert_eq!(summary.events_processed, 5);
    assert_eq!(summary.updates, 3);
    assert_eq!(summary.closed_at, Some(350));

    let analysis = host.resolve_analysis("active_tid").unwrap();
    assert!(analysis.history_file().exists());

    let ss = analysis.state_system(true).unwrap();
    let cpu0 = ss.quark_absolute(&split_attribute_path("0")).unwrap();
    let cpu1 = ss.quark_absolute(&split_attribute_path("1")).unwrap();

    assert_eq!(ss.start_time(), 100);
    assert_eq!(ss.query_single_state(250, cpu0).unwrap().value, StateValue::from("5"));
    assert_eq!(ss.query_single_state(350, cpu0).unwrap().value, StateValue::from("7"));
    assert_eq!(ss.query_single_state(150, cpu1).unwrap().value, StateValue::Null);
    assert_eq!(ss.query_single_state(200, cpu1).unwrap().value, StateValue::from("12"));
}

#[test]
fn test_second_run_reuses_built_history() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path());
    let host = FileHost::new(dir.path().join("supp")).with_active_trace(&trace);
    let config = ScanConfig::new().with_use_existing(true);

    let first = run_state_analysis(&host, "active_tid", &config).unwrap();
    assert!(!first.reused);

    let second = run_state_analysis(&host, "active_tid", &config).unwrap();
    assert!(second.reused);
    assert_eq!(second.updates, 0);
}

#[test]
fn test_same_named_traces_keep_separate_histories() {
    let dir = tempfile::tempdir().unwrap();
    let supp = dir.path().join("supp");
    let config = ScanConfig::new().with_use_existing(true);

    let mut traces = Vec::new();
    for (sub, tid) in [("a", 5), ("b", 99)] {
        let trace_dir = dir.path().join(sub);
        fs::create_dir_all(&trace_dir).unwrap();
        let trace = trace_dir.join("kernel.txt");
        fs::write(
            &trace,
            format!("[100] sched_switch: {{ cpu_id = 0 }}, {{ next_tid = {} }}\n", tid),
        )
        .unwrap();
        traces.push(trace);
    }

    let host_a = FileHost::new(&supp).with_active_trace(&traces[0]);
    let host_b = FileHost::new(&supp).with_active_trace(&traces[1]);
    assert_ne!(
        host_a.supplementary_dir(&traces[0]),
        host_b.supplementary_dir(&traces[1])
    );

    run_state_analysis(&host_a, "active_tid", &config).unwrap();
    let second = run_state_analysis(&host_b, "active_tid", &config).unwrap();
    assert!(!second.reused);

    let ss = host_b.resolve_analysis("active_tid").unwrap().state_system(true).unwrap();
    let cpu0 = ss.quark_absolute(&split_attribute_path("0")).unwrap();
    assert_eq!(ss.query_single_state(100, cpu0).unwrap().value, StateValue::from("99"));
}

#[test]
fn test_corrupt_history_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path());
    let host = FileHost::new(dir.path().join("supp")).with_active_trace(&trace);

    let history_file = host.resolve_analysis("active_tid").unwrap().history_file();
    fs::create_dir_all(history_file.parent().unwrap()).unwrap();
    fs::write(&history_file, "not a state history").unwrap();

    let analysis = host.resolve_analysis("active_tid").unwrap();
    let fresh = analysis.state_system(true).unwrap();
    assert!(!fresh.wait_until_built(std::time::Duration::ZERO));
    assert_eq!(fresh.start_time(), 100);

    let summary = run_state_analysis(
        &host,
        "active_tid",
        &ScanConfig::new().with_use_existing(true),
    )
    .unwrap();
    assert!(!summary.reused);
    assert_eq!(summary.updates, 3);

    let reloaded = InMemoryStateSystem::open_existing(&history_file).unwrap();
    assert!(reloaded.is_built());
}

#[test]
fn test_jsonl_trace_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("scenario.jsonl");
    fs::write(
        &trace,
        concat!(
            "{\"name\":\"sched_switch\",\"ts\":100,\"fields\":{\"CPU\":\"0\",\"next_tid\":\"5\"}}\n",
            "{\"name\":\"other\",\"ts\":200}\n",
            "{\"name\":\"sched_switch\",\"ts\":300,\"fields\":{\"CPU\":\"0\",\"next_tid\":\"7\"}}\n",
        ),
    )
    .unwrap();
    let host = FileHost::new(dir.path().join("supp")).with_active_trace(&trace);

    let summary = run_state_analysis(&host, "active_tid", &ScanConfig::new()).unwrap();
    assert_eq!(summary.updates, 2);
    assert_eq!(summary.closed_at, Some(300));

    let ss = host.resolve_analysis("active_tid").unwrap().state_system(true).unwrap();
    let intervals = ss.intervals();
    assert_eq!(intervals.len(), 2);
    assert_eq!((intervals[0].start, intervals[0].end), (100, 299));
    assert_eq!((intervals[1].start, intervals[1].end), (300, 300));
}

#[test]
fn test_no_active_trace() {
    let dir = tempfile::tempdir().unwrap();
    let host = FileHost::new(dir.path());
    let err = run_state_analysis(&host, "active_tid", &ScanConfig::new()).unwrap_err();
    assert!(matches!(err, ScanError::AnalysisNotFound(_)));
    assert!(!dir.path().join("active_tid.ht").exists());
}

#[test]
fn test_malformed_trace_stops_scan() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("bad.txt");
    fs::write(&trace, "[100] sched_switch: { cpu_id = 0 }, { next_tid = 5 }\n[oops\n").unwrap();
    let host = FileHost::new(dir.path().join("supp")).with_active_trace(&trace);

    let err = run_state_analysis(&host, "active_tid", &ScanConfig::new()).unwrap_err();
    assert!(matches!(err, ScanError::TraceParseError { line: 2, .. }));

    let analysis = host.resolve_analysis("active_tid").unwrap();
    assert!(!analysis.history_file().exists());
}

#[test]
fn test_demo_traces() {
    let demos = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("demos");
    let dir = tempfile::tempdir().unwrap();

    let text_host = FileHost::new(dir.path()).with_active_trace(demos.join("kernel.txt"));
    assert_eq!(run_event_count(&text_host, "count", &ScanConfig::new()).unwrap(), 5);

    let summary = run_state_analysis(&text_host, "active_tid", &ScanConfig::new()).unwrap();
    assert_eq!(summary.updates, 5);
    assert_eq!(summary.closed_at, Some(4200));

    let json_host = FileHost::new(dir.path()).with_active_trace(demos.join("kernel.jsonl"));
    assert_eq!(run_event_count(&json_host, "count", &ScanConfig::new()).unwrap(), 2);
}
