// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Error taxonomy.
//!
//! `UserError` and `SpawnError` are kept as distinct types for callers who
//! want to match on them precisely (e.g. the CLI deciding an exit code).
//! `Error` aggregates everything for consumers who just want one `?`-able
//! type, mirroring the layered adapter-error -> runtime-error wrapping
//! convention used across the rest of this workspace.

use thiserror::Error;

/// Mistakes made by the caller of the supervisor API: unknown ids, invalid
/// configuration. Always surfaced synchronously.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("unknown task id: {0}")]
    UnknownTask(String),
    #[error("concurrency must be non-negative")]
    NegativeConcurrency,
    #[error("rate limit requires both interval and cap to be set together")]
    IncompleteRateLimit,
    #[error("rate limit interval and cap must be positive")]
    NonPositiveRateLimit,
}

/// A child process failed to start. Captured on the task as `start_error`;
/// never an exception thrown back through `start`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("command was empty")]
    EmptyCommand,
    #[error("failed to spawn {program:?}: {message}")]
    Exec { program: String, message: String },
    #[error("Task was cancelled")]
    Cancelled,
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

/// Aggregate error type for consumers who don't need to distinguish kinds.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
