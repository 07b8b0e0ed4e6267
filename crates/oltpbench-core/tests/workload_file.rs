use std::time::Duration;

use oltpbench_core::{
    Arrival, CoreError, TraceSource, WorkloadFile,
};

const WORKLOAD: &str = r#"
type: sqlite
driver: sqlite
url: "file:bench.db"
terminals: 3
record_abort_messages: true
queue_limit: 50
grace_period_ms: 2500
seed: 42
transaction_types:
  - name: GetTweet
  - name: GetFollowers
works:
  - time: 10
    warmup: 2
    rate: 30
    arrival: poisson
    weights: [80, 20]
"#;

fn write_workload(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("workload.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_yaml_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(&dir, WORKLOAD);

    let file = WorkloadFile::load(&path).unwrap();
    let configs = file.build(&["twitter".to_string()], None).unwrap();
    let config = &configs[0];

    assert_eq!(config.benchmark, "twitter");
    assert!(config.record_abort_messages);
    assert_eq!(config.queue_limit, 50);
    assert_eq!(config.grace_period, Duration::from_millis(2500));
    assert_eq!(config.seed, 42);
    assert!(config.trace.is_none());

    let phase = &config.phases.phases()[0];
    assert_eq!(phase.arrival(), Arrival::Poisson);
    assert_eq!(phase.active_terminals(), 3);
    assert_eq!(phase.mean_interarrival(), Some(Duration::from_millis(100)));
}

#[test]
fn test_unknown_arrival_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(&dir, &WORKLOAD.replace("poisson", "bursty"));

    let err = WorkloadFile::load(&path)
        .unwrap()
        .build(&["twitter".to_string()], None)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidPhase { phase: 1, .. }));
}

#[test]
fn test_missing_file_is_a_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = WorkloadFile::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, CoreError::Source(_)));
}

#[test]
fn test_trace_replaces_timer_requirement() {
    let dir = tempfile::tempdir().unwrap();
    let untimed = WORKLOAD.replace("time: 10", "time: 0");
    let path = write_workload(&dir, &untimed);
    let ops = dir.path().join("ops.txt");
    let args = dir.path().join("args.txt");
    std::fs::write(&ops, "GetTweet\nGetFollowers\nGetTweet\n").unwrap();
    std::fs::write(&args, "1\n2\n3\n").unwrap();

    let file = WorkloadFile::load(&path).unwrap();
    assert!(file.build(&["twitter".to_string()], None).is_err());

    let source = TraceSource::new(&ops, &args);
    let configs = file.build(&["twitter".to_string()], Some(&source)).unwrap();
    let trace = configs[0].trace.as_ref().unwrap();
    assert_eq!(trace.len(), 3);
    assert_eq!(trace.next_entry().unwrap().transaction.name(), "GetTweet");
}

#[test]
fn test_empty_benchmark_list_is_rejected() {
    let file = WorkloadFile::from_contents(WORKLOAD, oltpbench_core::FileFormat::Yaml).unwrap();
    let err = file.build(&[], None).unwrap_err();
    assert!(err.is_configuration());
}
