// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! The canonical `Task` record.

use crate::error::SpawnError;
use crate::status::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

crate::define_id! {
    /// Unique identifier for a task, assigned at admission and never reused.
    pub struct TaskId;
}

/// A synchronous cancellation flag shared between a queued task's
/// `QueueOptions` and whatever external caller holds the matching
/// `TaskHandle`. Cheap to check on every scheduler dispatch tick; the
/// engine's dispatch loop pairs it with a `tokio::sync::Notify` where it
/// needs to wake a waiter rather than poll.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aging configuration for a queued task's effective priority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgingConfig {
    pub enabled: bool,
    /// Priority points added per minute of wait.
    pub increment_per_minute: f64,
    pub max_priority: i64,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            increment_per_minute: 0.0,
            max_priority: i64::MAX,
        }
    }
}

/// Present iff a task was submitted through the queueing path.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Base priority before aging is applied.
    pub priority: i64,
    /// The id used for queue-side lookups (`reprioritizeTask`,
    /// `cancelTask`). Usually equal to the owning task's id, but kept
    /// distinct and typed rather than smuggled through the metadata bag.
    pub queue_id: String,
    pub aging: AgingConfig,
    /// Epoch-ms at which the task entered the queue; aging is computed
    /// relative to this.
    pub queued_at_ms: u64,
    /// Synchronous cancellation signal, propagated into the task's
    /// execution context.
    pub cancel: CancelFlag,
}

impl QueueOptions {
    pub fn new(queue_id: impl Into<String>, priority: i64, queued_at_ms: u64) -> Self {
        Self {
            priority,
            queue_id: queue_id.into(),
            aging: AgingConfig::default(),
            queued_at_ms,
            cancel: CancelFlag::new(),
        }
    }
}

/// Configuration accepted by `Supervisor::start` and friends.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub cmd: Vec<String>,
    pub log_dir: PathBuf,
    pub tags: BTreeSet<String>,
    pub idle_timeout_ms: Option<u64>,
    pub priority: i64,
    /// Bypass the queue regardless of concurrency/pause state.
    pub immediate: bool,
    /// Aging policy applied while this task waits in the queue; has no
    /// effect on the direct path. Disabled by default.
    pub aging: AgingConfig,
    pub metadata: BTreeMap<String, String>,
}

impl TaskConfig {
    pub fn new(cmd: Vec<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            cmd,
            log_dir: log_dir.into(),
            tags: BTreeSet::new(),
            idle_timeout_ms: None,
            priority: 0,
            immediate: false,
            aging: AgingConfig::default(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_aging(mut self, increment_per_minute: f64, max_priority: i64) -> Self {
        self.aging = AgingConfig {
            enabled: true,
            increment_per_minute,
            max_priority,
        };
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// The canonical mutable record of a task, exactly one per `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub cmd: Vec<String>,
    pub log_path: PathBuf,
    pub tags: BTreeSet<String>,
    /// OS pid; `-1` until spawn succeeds, stays `-1` on start-failure.
    pub pid: i64,
    pub started_at_ms: u64,
    pub spawned_at_ms: Option<u64>,
    pub exited_at_ms: Option<u64>,
    pub exit_code: Option<i32>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_error: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Not serialized: queue bookkeeping is engine-internal and gone once
    /// a task leaves the queue.
    #[serde(skip)]
    pub queue: Option<QueueOptions>,
}

impl Task {
    pub fn new(id: TaskId, config: &TaskConfig, now_ms: u64) -> Self {
        let log_path = config.log_dir.join(format!("{}.log", id.as_str()));
        Self {
            id,
            cmd: config.cmd.clone(),
            log_path,
            tags: config.tags.clone(),
            pid: -1,
            started_at_ms: now_ms,
            spawned_at_ms: None,
            exited_at_ms: None,
            exit_code: None,
            status: TaskStatus::Queued,
            start_error: None,
            metadata: config.metadata.clone(),
            queue: None,
        }
    }

    pub fn mark_spawned(&mut self, pid: i64, now_ms: u64) {
        self.pid = pid;
        self.spawned_at_ms = Some(now_ms);
        self.status = TaskStatus::Running;
    }

    pub fn mark_start_failed(&mut self, err: &SpawnError, now_ms: u64) {
        self.status = TaskStatus::StartFailed;
        self.start_error = Some(err.to_string());
        self.exited_at_ms = Some(now_ms);
    }

    pub fn mark_exited(&mut self, exit_code: Option<i32>, now_ms: u64) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Exited;
        }
        self.exit_code = exit_code;
        self.exited_at_ms = Some(now_ms);
    }

    /// Pre-emptively label a running task `killed`/`timeout`; the exit
    /// observer leaves this label alone once the OS reports the exit.
    pub fn mark_terminating(&mut self, status: TaskStatus) {
        debug_assert!(matches!(status, TaskStatus::Killed | TaskStatus::Timeout));
        if self.status == TaskStatus::Running {
            self.status = status;
        }
    }

    pub fn finalize_terminating(&mut self, now_ms: u64) {
        self.exited_at_ms = Some(now_ms);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TaskConfig {
        TaskConfig::new(vec!["echo".into(), "hi".into()], "/tmp/logs")
    }

    #[test]
    fn new_task_is_queued_with_negative_pid() {
        let t = Task::new(TaskId::new("t1"), &cfg(), 100);
        assert_eq!(t.status, TaskStatus::Queued);
        assert_eq!(t.pid, -1);
        assert_eq!(t.started_at_ms, 100);
        assert!(t.spawned_at_ms.is_none());
    }

    #[test]
    fn log_path_matches_log_dir_and_id() {
        let t = Task::new(TaskId::new("abc"), &cfg(), 0);
        assert_eq!(t.log_path, PathBuf::from("/tmp/logs/abc.log"));
    }

    #[test]
    fn mark_spawned_sets_running_and_pid() {
        let mut t = Task::new(TaskId::new("t1"), &cfg(), 0);
        t.mark_spawned(1234, 10);
        assert_eq!(t.status, TaskStatus::Running);
        assert_eq!(t.pid, 1234);
        assert_eq!(t.spawned_at_ms, Some(10));
    }

    #[test]
    fn mark_start_failed_is_terminal_with_pid_negative_one() {
        let mut t = Task::new(TaskId::new("t1"), &cfg(), 0);
        t.mark_start_failed(&SpawnError::EmptyCommand, 5);
        assert_eq!(t.status, TaskStatus::StartFailed);
        assert_eq!(t.pid, -1);
        assert!(t.exited_at_ms.is_some());
        assert!(t.start_error.is_some());
    }

    #[test]
    fn mark_terminating_then_finalize_preserves_label() {
        let mut t = Task::new(TaskId::new("t1"), &cfg(), 0);
        t.mark_spawned(10, 1);
        t.mark_terminating(TaskStatus::Killed);
        assert_eq!(t.status, TaskStatus::Killed);
        // The exit observer reports after the fact; label must not flip.
        t.mark_exited(None, 20);
        assert_eq!(t.status, TaskStatus::Killed);
        t.finalize_terminating(20);
        assert_eq!(t.exited_at_ms, Some(20));
    }

    #[test]
    fn mark_exited_from_running_sets_exited() {
        let mut t = Task::new(TaskId::new("t1"), &cfg(), 0);
        t.mark_spawned(10, 1);
        t.mark_exited(Some(0), 50);
        assert_eq!(t.status, TaskStatus::Exited);
        assert_eq!(t.exit_code, Some(0));
    }

    #[test]
    fn cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn has_tag_checks_membership() {
        let cfg = TaskConfig::new(vec!["x".into()], "/tmp").with_tag("build");
        let t = Task::new(TaskId::new("t1"), &cfg, 0);
        assert!(t.has_tag("build"));
        assert!(!t.has_tag("deploy"));
    }
}
