use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;

fn ballotbot(config: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ballotbot").expect("binary built");
    cmd.env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .arg("--config")
        .arg(config)
        .args(["--status-port", "0"]);
    cmd
}

#[test]
fn info_prints_build_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let assert = ballotbot(&dir.path().join("config.yaml"))
        .arg("info")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("ballotbot System Information"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains("/votes/new"));
}

#[test]
fn config_validate_accepts_partial_file_and_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");

    fs::write(&path, "orchestrator:\n  cooldown: 10s\n").unwrap();
    ballotbot(&path).args(["config", "validate"]).assert().success();

    fs::write(&path, "readiness:\n  max_attempts: 0\n").unwrap();
    ballotbot(&path).args(["config", "validate"]).assert().failure();

    fs::write(&path, "orchestrator:\n  cooldown: soon\n").unwrap();
    ballotbot(&path).args(["config", "validate"]).assert().failure();
}

#[test]
fn config_reset_then_get_reads_defaults_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.yaml");

    ballotbot(&path).args(["config", "reset"]).assert().success();
    assert!(path.exists());

    let assert = ballotbot(&path)
        .args(["config", "get", "orchestrator.watchdog_interval"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("5m"));
}

#[test]
fn cookies_status_reports_store_state_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    let store = dir.path().join("import-cookies.txt");
    fs::write(
        &config,
        format!("credentials:\n  store_path: {}\n", store.display()),
    )
    .unwrap();

    let assert = ballotbot(&config)
        .args(["--output", "json", "cookies", "status"])
        .assert()
        .success();
    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["state"], "absent");
    assert_eq!(report["records"], 0);

    fs::write(&store, "# header\nsession_id=abc123\n").unwrap();
    let assert = ballotbot(&config)
        .args(["--output", "json", "cookies", "status"])
        .assert()
        .success();
    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["state"], "populated");
    assert_eq!(report["records"], 1);
}

#[test]
fn scan_without_api_key_fails_before_touching_the_browser() {
    let dir = tempfile::tempdir().unwrap();
    ballotbot(&dir.path().join("config.yaml"))
        .arg("scan")
        .assert()
        .failure();
}
