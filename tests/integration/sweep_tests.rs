//! Integration tests for the sweep pipeline
//!
//! These tests use wiremock to stand in for the probed hosts and run
//! complete sweeps against temporary input directories and databases.

use probe_sweep::config::{Config, InputConfig, OutputConfig, ProbeConfig};
use probe_sweep::run_sweep;
use probe_sweep::storage::{Namespace, ReadStore, RunStatus, SqliteStore, Store};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted in `dir`
fn create_test_config(dir: &TempDir, requests_per_minute: u32) -> Config {
    Config {
        probe: ProbeConfig {
            requests_per_minute,
            burst: 1,
            max_in_flight: 10,
            channel_capacity: 16,
            request_timeout_secs: 2,
            http_errors_are_failures: false,
        },
        input: InputConfig {
            directory: dir.path().join("input").to_string_lossy().into_owned(),
        },
        output: OutputConfig {
            database_path: dir.path().join("out/cache.db").to_string_lossy().into_owned(),
            failed_log_path: dir.path().join("out/failed.txt").to_string_lossy().into_owned(),
            failed_log_max_size_mb: 1,
        },
    }
}

/// Writes an input file and returns the path its checkpoint is keyed by
fn write_input(config: &Config, name: &str, lines: &[String]) -> PathBuf {
    let input_dir = Path::new(&config.input.directory);
    std::fs::create_dir_all(input_dir).unwrap();
    let file = input_dir.join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(&file, content).unwrap();
    file
}

fn failed_lines(config: &Config) -> Vec<String> {
    std::fs::read_to_string(&config.output.failed_log_path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn open_store(config: &Config) -> SqliteStore {
    SqliteStore::open(Path::new(&config.output.database_path)).unwrap()
}

async fn mount_head(server: &MockServer, route: &str, status: u16, expected: u64) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_sweep_records_every_url() {
    let server = MockServer::start().await;
    mount_head(&server, "/ok", 200, 1).await;
    mount_head(&server, "/missing", 404, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 600);
    let ok = format!("{}/ok", server.uri());
    let missing = format!("{}/missing", server.uri());
    let dead = "http://127.0.0.1:1/unreachable".to_string();
    let file = write_input(
        &config,
        "list.txt",
        &[ok.clone(), String::new(), missing.clone(), dead.clone()],
    );

    let report = run_sweep(&config, "test-hash").await.unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.probes_launched(), 3);
    assert_eq!(report.files[0].blank_lines, 1);
    assert_eq!(report.files[0].total_lines, 4);
    assert_eq!(report.aggregate.records_written, 2);
    assert_eq!(report.aggregate.failures_logged, 1);
    assert!(report.aggregate.dropped.is_empty());

    let store = open_store(&config);
    assert!(store.get(Namespace::UrlCache, &ok).unwrap().is_some());
    // any HTTP answer counts as reachable
    assert!(store.get(Namespace::UrlCache, &missing).unwrap().is_some());
    assert!(store.get(Namespace::UrlCache, &dead).unwrap().is_none());
    assert_eq!(
        store
            .get(Namespace::FileCheckpoints, &file.to_string_lossy())
            .unwrap(),
        Some("4".to_string())
    );

    assert_eq!(failed_lines(&config), vec![dead]);
}

#[tokio::test]
async fn test_rerun_probes_nothing_already_cached() {
    let server = MockServer::start().await;
    // one probe each across both runs
    mount_head(&server, "/a", 200, 1).await;
    mount_head(&server, "/b", 200, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 600);
    let urls = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
    let file = write_input(&config, "list.txt", &urls);

    let first = run_sweep(&config, "test-hash").await.unwrap();
    assert_eq!(first.probes_launched(), 2);

    // forget the checkpoint so the second run rescans every line
    {
        let mut store = open_store(&config);
        store
            .put(Namespace::FileCheckpoints, &file.to_string_lossy(), "0")
            .unwrap();
    }

    let second = run_sweep(&config, "test-hash").await.unwrap();
    assert_eq!(second.probes_launched(), 0);
    assert_eq!(second.cache_hits(), 2);
    assert_eq!(second.aggregate.records_written, 0);
    assert_eq!(open_store(&config).count(Namespace::UrlCache).unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_url_is_logged_once_after_all_attempts() {
    let server = MockServer::start().await;
    mount_head(&server, "/down", 503, 4).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 600);
    config.probe.http_errors_are_failures = true;
    let down = format!("{}/down", server.uri());
    write_input(&config, "list.txt", &[down.clone()]);

    let started = Instant::now();
    let report = run_sweep(&config, "test-hash").await.unwrap();

    // three pauses between four attempts
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert_eq!(report.aggregate.failures_logged, 1);
    assert_eq!(failed_lines(&config), vec![down.clone()]);
    assert!(open_store(&config)
        .get(Namespace::UrlCache, &down)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_resumes_from_stored_checkpoint() {
    let server = MockServer::start().await;
    for i in 0..5 {
        mount_head(&server, &format!("/skipped{i}"), 200, 0).await;
    }
    for i in 5..8 {
        mount_head(&server, &format!("/fresh{i}"), 200, 1).await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 600);
    let mut lines: Vec<String> = (0..5)
        .map(|i| format!("{}/skipped{i}", server.uri()))
        .collect();
    lines.extend((5..8).map(|i| format!("{}/fresh{i}", server.uri())));
    let file = write_input(&config, "list.txt", &lines);
    let key = file.to_string_lossy().into_owned();

    {
        let mut store = open_store(&config);
        store.put(Namespace::FileCheckpoints, &key, "5").unwrap();
    }

    let report = run_sweep(&config, "test-hash").await.unwrap();

    assert_eq!(report.files[0].resume_offset, 5);
    assert_eq!(report.probes_launched(), 3);
    assert_eq!(
        open_store(&config)
            .get(Namespace::FileCheckpoints, &key)
            .unwrap(),
        Some("8".to_string())
    );
}

#[tokio::test]
async fn test_repeated_url_is_cached_once() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 60);
    let a = format!("{}/a", server.uri());
    let b = format!("{}/b", server.uri());
    write_input(&config, "list.txt", &[a.clone(), b.clone(), a.clone()]);

    let report = run_sweep(&config, "test-hash").await.unwrap();

    // the second `a` is a cache hit unless it was read before the first
    // result landed, in which case it is probed again
    let report_file = &report.files[0];
    assert_eq!(report_file.probes_launched + report_file.cache_hits, 3);
    assert!(report_file.probes_launched >= 2);

    let store = open_store(&config);
    assert_eq!(store.count(Namespace::UrlCache).unwrap(), 2);
    assert!(store.get(Namespace::UrlCache, &a).unwrap().is_some());
    assert!(store.get(Namespace::UrlCache, &b).unwrap().is_some());
    assert!(failed_lines(&config).is_empty());
}

#[tokio::test]
async fn test_launch_rate_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(204))
        .expect(6)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    // 10 per second with a burst of one
    let config = create_test_config(&dir, 600);
    let lines: Vec<String> = (0..6).map(|i| format!("{}/r{i}", server.uri())).collect();
    write_input(&config, "list.txt", &lines);

    let started = Instant::now();
    let report = run_sweep(&config, "test-hash").await.unwrap();

    assert_eq!(report.probes_launched(), 6);
    assert!(started.elapsed() >= Duration::from_millis(450));
}

#[tokio::test]
async fn test_files_are_swept_in_name_order() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 600);
    let second = write_input(&config, "b.txt", &[format!("{}/b", server.uri())]);
    let first = write_input(&config, "a.txt", &[format!("{}/a", server.uri())]);

    let report = run_sweep(&config, "test-hash").await.unwrap();

    let swept: Vec<&PathBuf> = report.files.iter().map(|f| &f.file).collect();
    assert_eq!(swept, vec![&first, &second]);

    let store = open_store(&config);
    let checkpoints = store.checkpoints().unwrap();
    assert_eq!(
        checkpoints,
        vec![
            (first.to_string_lossy().into_owned(), "1".to_string()),
            (second.to_string_lossy().into_owned(), "1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_run_ledger_marks_completion() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 600);
    write_input(&config, "empty.txt", &[]);

    let report = run_sweep(&config, "abc123").await.unwrap();

    let run = open_store(&config).latest_run().unwrap().unwrap();
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.config_hash, "abc123");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_missing_input_directory_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 600);

    let result = run_sweep(&config, "test-hash").await;
    assert!(result.is_err());

    let run = open_store(&config).latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}
