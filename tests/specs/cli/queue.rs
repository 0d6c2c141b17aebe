//! `queue` behavior specs.
//!
//! Each CLI invocation constructs a fresh, empty `Supervisor` (this binary
//! has no daemon), so these specs exercise the administrative surface
//! against an empty queue rather than cross-process state.

use crate::prelude::cli;
use predicates::str::contains;

#[test]
fn status_on_fresh_queue_reports_zero_size() {
    cli()
        .args(["queue", "status"])
        .assert()
        .success()
        .stdout(contains("size:"))
        .stdout(contains("0"));
}

#[test]
fn health_on_fresh_queue_is_healthy() {
    cli()
        .args(["queue", "health"])
        .assert()
        .success()
        .stdout(contains("healthy"));
}

#[test]
fn pause_and_resume_succeed() {
    cli().args(["queue", "pause"]).assert().success();
    cli().args(["queue", "resume"]).assert().success();
}

#[test]
fn list_queued_on_fresh_queue_reports_no_tasks() {
    cli()
        .args(["queue", "list", "queued"])
        .assert()
        .success()
        .stdout(contains("no queued tasks"));
}

#[test]
fn cancel_rejects_malformed_selector() {
    cli()
        .args(["queue", "cancel", "not-a-selector"])
        .assert()
        .failure();
}

#[test]
fn concurrency_rejects_negative_values() {
    cli().args(["queue", "concurrency", "-1"]).assert().failure();
}

#[test]
fn concurrency_accepts_zero_as_a_valid_limited_cap() {
    cli().args(["queue", "concurrency", "0"]).assert().success();
}

#[test]
fn priority_set_on_unknown_id_fails() {
    cli()
        .args(["queue", "priority", "set", "nonexistent", "HIGH"])
        .assert()
        .failure();
}

#[test]
fn help_subcommand_prints_summary() {
    cli()
        .args(["queue", "help"])
        .assert()
        .success()
        .stdout(contains("queue subcommands"));
}
