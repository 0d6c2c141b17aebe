//! `start` behavior specs.

use crate::prelude::cli;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn start_admits_task_and_prints_running_status() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    cli()
        .args(["start", "--log-dir"])
        .arg(&log_dir)
        .args(["--", "true"])
        .assert()
        .success()
        .stdout(contains("status:"))
        .stdout(contains("running"));
}

#[test]
fn start_applies_repeated_tags() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    cli()
        .args(["start", "--log-dir"])
        .arg(&log_dir)
        .args(["--tag", "smoke", "--tag", "ci", "--", "true"])
        .assert()
        .success()
        .stdout(contains("smoke"))
        .stdout(contains("ci"));
}

#[test]
fn start_json_output_is_valid_json() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let output = cli()
        .args(["--output", "json", "start", "--log-dir"])
        .arg(&log_dir)
        .args(["--", "true"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["status"], "running");
}

#[test]
fn start_creates_log_directory() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("nested").join("logs");
    assert!(!log_dir.exists());

    cli()
        .args(["start", "--log-dir"])
        .arg(&log_dir)
        .args(["--", "true"])
        .assert()
        .success();

    assert!(log_dir.is_dir());
}
