//! CLI help output specs.

use crate::prelude::cli;
use predicates::str::contains;

#[test]
fn no_args_shows_usage_and_exits_zero() {
    cli().assert().success().stdout(contains("Usage:"));
}

#[test]
fn help_flag_shows_usage() {
    cli().arg("--help").assert().success().stdout(contains("Usage:"));
}

#[test]
fn queue_help_shows_subcommands() {
    cli()
        .args(["queue", "--help"])
        .assert()
        .success()
        .stdout(contains("status"))
        .stdout(contains("shutdown"));
}

#[test]
fn version_flag_shows_version() {
    cli().arg("--version").assert().success().stdout(contains("0.1"));
}
