//! CLI Integration Tests
//!
//! Drives the `beanwatch` binary against a temporary server root.
//!
//! Test Scenarios:
//! 1. Offline record followed by query, with and without a port
//! 2. Exit status for malformed queries
//! 3. Reset removes the store
//! 4. Configuration errors

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use beanwatch_cli::commands::{self, RecordRequest};

// ============================================================================
// Test Helpers
// ============================================================================

fn beanwatch_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_beanwatch"))
}

/// Writes a config rooted at `dir` with one vhost and returns its path.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("beanwatch.toml");
    let contents = format!(
        "[server]\nserver_root = {:?}\n\n[log]\nlevel = \"warn\"\n\n[[vhost]]\nhostname = \"e.example\"\nport = 80\n",
        dir.display().to_string()
    );
    fs::write(&path, contents).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(beanwatch_bin())
        .arg(args[0])
        .arg("-c")
        .arg(config)
        .args(&args[1..])
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run beanwatch")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Initializes the store the way a first server start would.
fn initialize(config: &Path) {
    let config = commands::load_config(Some(config)).unwrap();
    beanwatch_server::Host::start(
        config,
        std::sync::Arc::new(beanwatch_server::Scoreboard::new(1)),
        beanwatch_metrics::Lifecycle::Startup,
    )
    .unwrap();
}

// ============================================================================
// Record and Query
// ============================================================================

#[test]
fn test_record_then_query() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    initialize(&config);

    let output = run(
        &config,
        &[
            "record", "--host", "e.example", "--port", "80", "--method", "GET", "--status", "200",
            "--bytes-in", "100", "--bytes-out", "500",
        ],
    );
    assert!(output.status.success(), "{:?}", output);

    let output = run(&config, &["query", "query=beanwatch_vhost:Type=since-start,Host=e.example"]);
    assert!(output.status.success(), "{:?}", output);
    let text = stdout(&output);
    assert!(text.starts_with("Name: beanwatch_vhost:Host=e.example,Port=80,Type=since-start\n"), "{text}");
    assert!(text.contains("InRequestsGET: 1\n"), "{text}");
    assert!(text.contains("OutBytes200: 500\n"), "{text}");
}

#[test]
fn test_record_without_port_counts_named_vhost() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    fs::write(
        &config,
        fs::read_to_string(&config).unwrap() + "\n[[vhost]]\nhostname = \"b.example\"\nport = 80\n",
    )
    .unwrap();
    initialize(&config);

    let output = run(&config, &["record", "--host", "b.example", "--method", "GET", "--status", "200"]);
    assert!(output.status.success(), "{:?}", output);

    let text = stdout(&run(&config, &["query", "query=beanwatch_vhost:Type=forever,Host=b.example"]));
    assert!(text.contains("InRequestsGET: 1\n"), "{text}");
    let text = stdout(&run(&config, &["query", "query=beanwatch_vhost:Type=forever,Host=e.example"]));
    assert!(text.contains("InRequestsGET: 0\n"), "{text}");
}

#[test]
fn test_record_before_initialization_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["record", "--host", "e.example", "--method", "GET", "--status", "200"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not initialized"));
}

#[test]
fn test_query_uninitialized_store_renders_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let config = commands::load_config(Some(&write_config(dir.path()))).unwrap();

    let text = commands::query(config, Some("query=beanwatch_vhost:Type=forever,Host=e.example")).unwrap();
    assert!(text.contains("InRequests: 0\n"), "{text}");
}

// ============================================================================
// Malformed Queries
// ============================================================================

#[test]
fn test_bad_query_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["query", "query=nocolon"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_empty_result_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["query", "query=nobody:*"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn test_reset_deletes_store() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    initialize(&config_path);
    let config = commands::load_config(Some(&config_path)).unwrap();
    assert!(config.store_path().exists());

    let output = run(&config_path, &["reset"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(!config.store_path().exists());
    assert!(config.lock_path().exists());

    // Resetting twice is harmless.
    commands::reset(&config).unwrap();
}

#[test]
fn test_record_via_library() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    initialize(&config_path);

    let request = RecordRequest {
        host: "E.EXAMPLE:80".into(),
        port: 80,
        method: "POST".into(),
        status: 404,
        bytes_in: 10,
        bytes_out: 20,
    };
    commands::record(commands::load_config(Some(&config_path)).unwrap(), &request).unwrap();

    let text = commands::query(
        commands::load_config(Some(&config_path)).unwrap(),
        Some("query=beanwatch_vhost:Type=forever,Host=_GLOBAL_"),
    )
    .unwrap();
    assert!(text.contains("InRequestsPOST: 1\n"), "{text}");
    assert!(text.contains("OutResponses404: 1\n"), "{text}");
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&dir.path().join("absent.toml"), &["query"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load configuration"));
}
