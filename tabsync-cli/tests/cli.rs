//! End-to-end tests for the `tabsync` binary.

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::path::Path;

fn tabsync() -> Command {
    let mut cmd = Command::cargo_bin("tabsync").expect("tabsync binary is built");
    cmd.env("RUST_LOG", "error");
    cmd
}

fn init_store(path: &Path) {
    tabsync()
        .arg("init")
        .arg(path)
        .args(["--cache-guid", "e2e"])
        .assert()
        .success()
        .stdout(contains("Store snapshot created"));
}

#[test]
fn help_lists_commands() {
    tabsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("inspect").and(contains("sweep")).and(contains("delete")));
}

#[test]
fn inspect_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    init_store(&path);

    tabsync()
        .arg("inspect")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("Local tag: session_synce2e").and(contains("Foreign sessions: NONE")));
}

#[test]
fn inspect_json_is_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    init_store(&path);

    let output = tabsync().arg("inspect").arg(&path).arg("--json").output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["machine_tag"], "session_synce2e");
    assert_eq!(report["sessions"].as_array().unwrap().len(), 0);
}

#[test]
fn init_refuses_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    init_store(&path);

    tabsync()
        .arg("init")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn sweep_with_write_adds_cli_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    init_store(&path);

    tabsync()
        .arg("sweep")
        .arg(&path)
        .arg("--write")
        .assert()
        .success()
        .stdout(contains("Deleted 0 stale sessions"));

    let snapshot = std::fs::read_to_string(&path).unwrap();
    assert!(snapshot.contains("tabsync-cli"));
}

#[test]
fn delete_unknown_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    init_store(&path);

    tabsync()
        .args(["delete"])
        .arg(&path)
        .arg("session_syncnobody")
        .assert()
        .success()
        .stdout(contains("No nodes found"));
}

#[test]
fn config_uses_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("tabsync.toml");
    std::fs::write(&config, "[cleanup]\nstale_session_threshold_days = 5\n").unwrap();

    tabsync()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(contains("stale_session_threshold_days = 5"));
}

#[test]
fn missing_snapshot_fails() {
    let dir = tempfile::tempdir().unwrap();

    tabsync()
        .arg("inspect")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(contains("Failed to read snapshot"));
}
