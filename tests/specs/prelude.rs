//! Test helpers for black-box specs of the `taskyard` binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;

/// A `Command` for the `taskyard` binary, ready for `.arg()`/`.args()`.
pub fn cli() -> Command {
    Command::cargo_bin("taskyard").expect("taskyard binary should build")
}
