//! End-to-end tests for CLI commands using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pulse_cmd() -> Command {
    Command::cargo_bin("pulse").unwrap()
}

#[test]
fn test_version_output() {
    pulse_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pulse"));
}

#[test]
fn test_help_shows_all_commands() {
    pulse_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_serve_help() {
    pulse_cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--host"));
}

#[test]
fn test_watch_help() {
    pulse_cmd()
        .args(["watch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--url"))
        .stdout(predicate::str::contains("--channel"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_config_init_creates_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pulse.toml");

    pulse_cmd()
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[[telemetry.sources]]"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pulse.toml");
    std::fs::write(&path, "keep me").unwrap();

    pulse_cmd()
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
}

#[test]
fn test_serve_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pulse.toml");
    std::fs::write(&path, "[liveness]\ntimeout_seconds = 0\n").unwrap();

    pulse_cmd()
        .args(["serve", "-c"])
        .arg(&path)
        .env_remove("PULSE_PORT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("liveness.timeout_seconds"));
}

#[test]
fn test_watch_rejects_non_websocket_url() {
    pulse_cmd()
        .args(["watch", "--url", "http://127.0.0.1:8600/ws"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("client.url"));
}

#[test]
fn test_completions_bash() {
    pulse_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pulse"));
}

#[test]
fn test_invalid_subcommand_fails() {
    pulse_cmd().arg("frobnicate").assert().failure();
}
