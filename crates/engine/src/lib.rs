// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! taskyard-engine: scheduler, process executor, hook dispatcher, and the
//! `Supervisor` that bundles them into one public entry point.

pub mod error;
pub mod executor;
pub mod hooks;
pub mod log_sink;
pub mod log_watcher;
pub mod queue;
pub mod scheduler;
pub mod signal;
pub mod stats;
pub mod supervisor;
pub mod task_handle;

pub use error::{Error, Result};
pub use executor::{ExecutorEvent, ProcessExecutor, RunningHandle, DEFAULT_IDLE_TIMEOUT};
pub use hooks::{HookCallback, HookContext, HookDispatcher, HookKind, HookSet, DEFAULT_HOOK_TIMEOUT};
pub use log_sink::LogSink;
pub use log_watcher::LogWatcher;
pub use queue::{PriorityQueue, QueueEntry};
pub use scheduler::{Concurrency, ExecutionPath, PathDecision, RateLimit, Scheduler, QUEUE_CONCURRENCY_THRESHOLD};
pub use signal::{send_signal, Signal};
pub use stats::{current_rss_bytes, derive_health, HealthReport, HealthStatus, QueueStats, Stats};
pub use supervisor::{ExitResult, ShutdownOptions, ShutdownReport, StartSpec, Supervisor, WaitError};
pub use task_handle::TaskHandle;
