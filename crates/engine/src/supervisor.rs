// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! The task registry, dispatch loop, and public entry point every other
//! component is reached through.
//!
//! Everything that mutates shared state — the registry, the `Scheduler`,
//! `Stats` — goes through one `parking_lot::Mutex<Inner>`, held only for
//! the duration of a synchronous mutation and never across an `.await`.
//! Spawning a process is itself synchronous (`ProcessExecutor::spawn`), so
//! the direct-path start can run to completion inside that same critical
//! section.

use crate::executor::{ExecutorEvent, ProcessExecutor, RunningHandle, DEFAULT_IDLE_TIMEOUT};
use crate::hooks::{HookContext, HookDispatcher, HookKind, HookSet};
use crate::log_sink::LogSink;
use crate::log_watcher::LogWatcher;
use crate::queue::QueueEntry;
use crate::scheduler::{Concurrency, ExecutionPath, RateLimit, Scheduler};
use crate::signal::{send_signal, Signal};
use crate::stats::{current_rss_bytes, derive_health, HealthReport, QueueStats, Stats};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskyard_core::task::QueueOptions;
use taskyard_core::{Clock, IdGen, SpawnError, Task, TaskConfig, TaskId, TaskStatus, UserError};
use tokio::sync::{oneshot, Notify};

/// Bundles a `TaskConfig` with the hooks to register for this one task.
/// Kept separate from `TaskConfig` because hooks are an engine-level
/// concept (`HookSet`), while `TaskConfig` lives in `taskyard-core` with
/// no dependency on the engine crate.
#[derive(Clone)]
pub struct StartSpec {
    pub config: TaskConfig,
    pub hooks: HookSet,
}

impl StartSpec {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            config,
            hooks: HookSet::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: HookSet) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Outcome of waiting on a task that never completed normally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WaitError {
    #[error("unknown task id: {0}")]
    Unknown(String),
    #[error("task failed to start: {0}")]
    StartFailed(String),
}

/// Returned by `wait_for_task`/`wait_for_all`/`start_and_wait`. `task` is
/// `None` only for `WaitError::Unknown` ids with no registry entry to
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitResult {
    pub task_id: TaskId,
    pub exit_code: Option<i32>,
    pub signalled: bool,
    pub duration_ms: u64,
    pub log: String,
    pub task: Option<Task>,
}

/// Parameters for `shutdown [timeout_ms] [--force] [--no-cancel]`.
#[derive(Debug, Clone, Default)]
pub struct ShutdownOptions {
    /// Defaults to 30s when unset.
    pub timeout_ms: Option<u64>,
    /// SIGKILL anything still running once the timeout elapses.
    pub force: bool,
    /// Cancel queued-but-not-started tasks immediately rather than leaving
    /// them paused in the queue.
    pub cancel_pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub cancelled: Vec<TaskId>,
    pub force_killed: Vec<TaskId>,
    pub waited_ms: u64,
}

struct TaskEntry {
    task: Task,
    hooks: HookSet,
    idle_timeout_ms: u64,
    log_sink: Option<Arc<LogSink>>,
    handle: Option<RunningHandle>,
    watcher: Option<LogWatcher>,
    start_waiters: Vec<oneshot::Sender<Result<(), WaitError>>>,
    terminal_waiters: Vec<oneshot::Sender<()>>,
}

impl TaskEntry {
    fn new(task: Task, hooks: HookSet, idle_timeout_ms: u64) -> Self {
        Self {
            task,
            hooks,
            idle_timeout_ms,
            log_sink: None,
            handle: None,
            watcher: None,
            start_waiters: Vec::new(),
            terminal_waiters: Vec::new(),
        }
    }
}

struct Inner {
    tasks: IndexMap<TaskId, TaskEntry>,
    scheduler: Scheduler,
    stats: Stats,
    accepting: bool,
}

struct SupervisorCore<C: Clock> {
    inner: Mutex<Inner>,
    clock: C,
    executor: ProcessExecutor<C>,
    hooks: Arc<HookDispatcher>,
    id_gen: Box<dyn Fn() -> String + Send + Sync>,
    global_hooks: HookSet,
    queue_condition: Notify,
}

/// The task registry, scheduler, and process executor bundled behind a
/// cheap-to-clone handle. Every embedding caller — the CLI, a library
/// consumer — talks to one `Supervisor` instance.
pub struct Supervisor<C: Clock = taskyard_core::SystemClock> {
    core: Arc<SupervisorCore<C>>,
}

impl<C: Clock> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn new(clock: C, id_gen: impl IdGen + 'static) -> Self {
        Self::with_hooks(clock, id_gen, HookSet::default())
    }

    pub fn with_hooks(clock: C, id_gen: impl IdGen + 'static, global_hooks: HookSet) -> Self {
        let core = SupervisorCore {
            inner: Mutex::new(Inner {
                tasks: IndexMap::new(),
                scheduler: Scheduler::new(),
                stats: Stats::new(clock.now_ms()),
                accepting: true,
            }),
            executor: ProcessExecutor::new(clock.clone()),
            clock,
            hooks: Arc::new(HookDispatcher::default()),
            id_gen: Box::new(move || id_gen.next()),
            global_hooks,
            queue_condition: Notify::new(),
        };
        Self { core: Arc::new(core) }
    }

    // -- submission -------------------------------------------------------

    /// Admit a task, taking the direct or queued path per the scheduler's
    /// decision. Returns synchronously; for the direct path the returned
    /// snapshot already reflects `running`/`start-failed`, for the queued
    /// path it reflects `queued`.
    pub fn start(&self, spec: StartSpec) -> Task {
        self.admit(spec)
    }

    /// `startImmediate`: forces the direct path regardless of concurrency
    /// or pause state.
    pub fn start_immediate(&self, mut spec: StartSpec) -> Task {
        spec.config.immediate = true;
        self.admit(spec)
    }

    pub fn start_with_handle(&self, spec: StartSpec) -> (Task, crate::task_handle::TaskHandle<C>) {
        let task = self.admit(spec);
        let handle = crate::task_handle::TaskHandle::new(self.clone(), task.id.clone());
        (task, handle)
    }

    /// Resolves once the task has left `queued` (either started running or
    /// failed to start), returning the up-to-date snapshot.
    pub async fn start_async(&self, spec: StartSpec) -> Task {
        let task = self.admit(spec);
        let _ = self.wait_to_start(&task.id).await;
        self.get(&task.id).unwrap_or(task)
    }

    /// Starts the task and waits for it to reach a terminal status.
    pub async fn start_and_wait(&self, spec: StartSpec) -> Result<ExitResult, WaitError> {
        let task = self.admit(spec);
        self.wait_for_task(&task.id).await
    }

    fn admit(&self, spec: StartSpec) -> Task {
        let now = self.core.clock.now_ms();
        let id = TaskId::new((self.core.id_gen)());
        let mut task = Task::new(id.clone(), &spec.config, now);
        let hooks = HookSet::merge(&self.core.global_hooks, &spec.hooks);
        let idle_timeout_ms = spec
            .config
            .idle_timeout_ms
            .unwrap_or(DEFAULT_IDLE_TIMEOUT.as_millis() as u64);

        let mut inner = self.core.inner.lock();
        if !inner.accepting {
            task.mark_start_failed(&SpawnError::ShuttingDown, now);
            inner.tasks.insert(
                id.clone(),
                TaskEntry::new(task.clone(), hooks.clone(), idle_timeout_ms),
            );
            inner.stats.record_added();
            inner.stats.record_failed();
            drop(inner);
            self.dispatch_hook(HookKind::OnTaskStartFail, hooks, task.clone());
            return task;
        }

        let decision = inner.scheduler.decide_path(spec.config.immediate);
        inner.stats.record_added();
        tracing::debug!(%id, path = ?decision.path, reason = decision.reason, "admission decision");

        match decision.path {
            ExecutionPath::Direct => {
                inner.scheduler.note_direct_start();
                inner
                    .tasks
                    .insert(id.clone(), TaskEntry::new(task.clone(), hooks, idle_timeout_ms));
                drop(inner);
                self.spawn_now(id.clone(), now);
            }
            ExecutionPath::Queued => {
                let queue_id = id.as_str().to_string();
                let mut queue_options = QueueOptions::new(queue_id.clone(), spec.config.priority, now);
                queue_options.aging = spec.config.aging;
                task.queue = Some(queue_options);
                inner.scheduler.enqueue(
                    id.clone(),
                    queue_id,
                    spec.config.priority,
                    spec.config.aging,
                    now,
                );
                inner
                    .tasks
                    .insert(id.clone(), TaskEntry::new(task.clone(), hooks, idle_timeout_ms));
                drop(inner);
                self.core.queue_condition.notify_waiters();
                self.dispatch();
            }
        }

        self.get(&id).unwrap_or(task)
    }

    // -- dispatch loop ------------------------------------------------------

    /// Drain every entry the scheduler is currently willing to dispatch,
    /// then schedule a wakeup if the only thing blocking further dispatch
    /// is the rate-limit window rolling forward.
    fn dispatch(&self) {
        loop {
            let now = self.core.clock.now_ms();
            let next = {
                let mut inner = self.core.inner.lock();
                inner.scheduler.recompute_aging(now);
                inner.scheduler.try_pop_for_dispatch(now)
            };
            let Some(entry) = next else { break };
            self.spawn_queued(entry);
        }

        let now = self.core.clock.now_ms();
        let wake_at = {
            let inner = self.core.inner.lock();
            inner.scheduler.next_rate_limit_wakeup(now)
        };
        if let Some(at_ms) = wake_at {
            let delay = Duration::from_millis(at_ms.saturating_sub(now));
            let sup = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                sup.dispatch();
            });
        }
    }

    fn spawn_queued(&self, entry: QueueEntry) {
        let now = self.core.clock.now_ms();
        {
            let mut inner = self.core.inner.lock();
            if let Some(te) = inner.tasks.get(&entry.task_id) {
                let wait_ms = now.saturating_sub(te.task.started_at_ms);
                inner.stats.record_wait(wait_ms);
            }
        }
        self.spawn_now(entry.task_id, now);
    }

    /// Open the log file and fork/exec. Synchronous from the caller's point
    /// of view: `ProcessExecutor::spawn` is itself non-async, so this never
    /// awaits while holding `inner`.
    fn spawn_now(&self, id: TaskId, now_ms: u64) {
        let (cmd, log_path, idle_timeout_ms) = {
            let inner = self.core.inner.lock();
            let Some(te) = inner.tasks.get(&id) else { return };
            (te.task.cmd.clone(), te.task.log_path.clone(), te.idle_timeout_ms)
        };

        let log_sink = match LogSink::create(log_path, now_ms) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                let program = cmd.first().cloned().unwrap_or_default();
                self.fail_to_start(
                    &id,
                    SpawnError::Exec {
                        program,
                        message: e.to_string(),
                    },
                    now_ms,
                );
                return;
            }
        };

        let sup = self.clone();
        let events: crate::executor::EventSink = Arc::new(move |ev| sup.handle_executor_event(ev));
        let idle_timeout = Some(Duration::from_millis(idle_timeout_ms));

        match self
            .core
            .executor
            .spawn(id.clone(), &cmd, log_sink.clone(), idle_timeout, events)
        {
            Ok(handle) => {
                let (hooks, task_snapshot, start_waiters) = {
                    let mut inner = self.core.inner.lock();
                    let Some(te) = inner.tasks.get_mut(&id) else { return };
                    te.task.mark_spawned(handle.pid, now_ms);
                    te.log_sink = Some(log_sink);
                    te.handle = Some(handle);
                    let hooks = te.hooks.clone();
                    let task = te.task.clone();
                    let start_waiters = std::mem::take(&mut te.start_waiters);
                    (hooks, task, start_waiters)
                };
                for w in start_waiters {
                    let _ = w.send(Ok(()));
                }
                if !hooks.on_change.is_empty() {
                    let sup = self.clone();
                    let tid = id.clone();
                    let watcher = LogWatcher::spawn(
                        task_snapshot.log_path.clone(),
                        hooks.on_change.clone(),
                        self.core.hooks.clone(),
                        move || sup.get(&tid),
                    );
                    let mut inner = self.core.inner.lock();
                    if let Some(te) = inner.tasks.get_mut(&id) {
                        te.watcher = Some(watcher);
                    }
                }
                self.core.queue_condition.notify_waiters();
            }
            Err(e) => self.fail_to_start(&id, e, now_ms),
        }
    }

    /// A spawn attempt (direct or dispatched-from-queue) failed. Releases
    /// the concurrency slot it provisionally consumed — an error during
    /// spawn still counts as a consumed slot that must be released.
    fn fail_to_start(&self, id: &TaskId, err: SpawnError, now_ms: u64) {
        let (hooks, task_snapshot, start_waiters, term_waiters) = {
            let mut inner = self.core.inner.lock();
            let Some(te) = inner.tasks.get_mut(id) else { return };
            te.task.mark_start_failed(&err, now_ms);
            inner.scheduler.release_slot();
            inner.stats.record_failed();
            let hooks = te.hooks.clone();
            let task = te.task.clone();
            let start_waiters = std::mem::take(&mut te.start_waiters);
            let term_waiters = std::mem::take(&mut te.terminal_waiters);
            (hooks, task, start_waiters, term_waiters)
        };
        self.core.queue_condition.notify_waiters();
        let message = task_snapshot.start_error.clone().unwrap_or_default();
        for w in start_waiters {
            let _ = w.send(Err(WaitError::StartFailed(message.clone())));
        }
        for w in term_waiters {
            let _ = w.send(());
        }
        self.dispatch_hook(HookKind::OnTaskStartFail, hooks, task_snapshot);
        self.dispatch();
    }

    /// A queued task was cancelled before ever being dispatched: unlike
    /// [`Self::fail_to_start`], no concurrency slot was ever consumed.
    fn fail_queued_entry(&self, id: &TaskId, now_ms: u64) {
        let (hooks, task_snapshot, start_waiters, term_waiters) = {
            let mut inner = self.core.inner.lock();
            let Some(te) = inner.tasks.get_mut(id) else { return };
            te.task.mark_start_failed(&SpawnError::Cancelled, now_ms);
            inner.stats.record_cancelled();
            let hooks = te.hooks.clone();
            let task = te.task.clone();
            let start_waiters = std::mem::take(&mut te.start_waiters);
            let term_waiters = std::mem::take(&mut te.terminal_waiters);
            (hooks, task, start_waiters, term_waiters)
        };
        for w in start_waiters {
            let _ = w.send(Err(WaitError::StartFailed("Task was cancelled".into())));
        }
        for w in term_waiters {
            let _ = w.send(());
        }
        self.dispatch_hook(HookKind::OnTaskStartFail, hooks, task_snapshot);
    }

    /// Applied from the executor's watchdog/exit-observer tasks.
    fn handle_executor_event(&self, ev: ExecutorEvent) {
        match ev {
            ExecutorEvent::IdleTimeout { id, at_ms } => self.finalize(&id, None, TaskStatus::Timeout, at_ms),
            ExecutorEvent::Exited { id, code, at_ms } => self.finalize(&id, code, TaskStatus::Exited, at_ms),
        }
    }

    /// Common terminal-transition path for both a clean exit and a
    /// watchdog-driven kill. `label_if_running` only applies the
    /// pre-emptive label when the task hasn't already been marked
    /// `killed`/`timeout` by an explicit `kill()` call.
    fn finalize(&self, id: &TaskId, code: Option<i32>, label_if_running: TaskStatus, now_ms: u64) {
        let (hooks, task_snapshot, term_waiters) = {
            let mut inner = self.core.inner.lock();
            let Some(te) = inner.tasks.get_mut(id) else { return };
            if te.task.status.is_terminal() {
                return;
            }
            if label_if_running != TaskStatus::Exited {
                te.task.mark_terminating(label_if_running);
            }
            te.task.mark_exited(code, now_ms);
            te.task.finalize_terminating(now_ms);
            if let Some(sink) = &te.log_sink {
                sink.close();
            }
            if let Some(w) = te.watcher.take() {
                w.shutdown();
            }
            inner.scheduler.release_slot();
            match te.task.status {
                TaskStatus::Exited if code == Some(0) => inner.stats.record_completed(),
                _ => inner.stats.record_failed(),
            }
            let run_ms = te
                .task
                .spawned_at_ms
                .map(|s| now_ms.saturating_sub(s))
                .unwrap_or(0);
            inner.stats.record_run(run_ms);
            let hooks = te.hooks.clone();
            let task = te.task.clone();
            let term_waiters = std::mem::take(&mut te.terminal_waiters);
            (hooks, task, term_waiters)
        };

        self.core.queue_condition.notify_waiters();
        for w in term_waiters {
            let _ = w.send(());
        }
        let kind = match task_snapshot.status {
            TaskStatus::Exited if task_snapshot.exit_code == Some(0) => HookKind::OnSuccess,
            TaskStatus::Exited => HookKind::OnFailure,
            TaskStatus::Killed => HookKind::OnTerminated,
            TaskStatus::Timeout => HookKind::OnTimeout,
            _ => HookKind::OnFailure,
        };
        self.dispatch_hook(kind, hooks, task_snapshot);
        self.dispatch();
    }

    fn dispatch_hook(&self, kind: HookKind, hooks: HookSet, task: Task) {
        let callbacks = hooks.for_kind(kind).to_vec();
        if callbacks.is_empty() {
            return;
        }
        let dispatcher = self.core.hooks.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(kind, &callbacks, HookContext::terminal(task)).await;
        });
    }

    // -- lookups -------------------------------------------------------------

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        let inner = self.core.inner.lock();
        inner.tasks.get(id).map(|te| te.task.clone())
    }

    pub fn list(&self) -> Vec<Task> {
        let inner = self.core.inner.lock();
        inner.tasks.values().map(|te| te.task.clone()).collect()
    }

    pub fn list_running(&self) -> Vec<Task> {
        let inner = self.core.inner.lock();
        inner
            .tasks
            .values()
            .filter(|te| te.task.status == TaskStatus::Running)
            .map(|te| te.task.clone())
            .collect()
    }

    /// Alias for [`Self::list_running`].
    pub fn running_tasks(&self) -> Vec<Task> {
        self.list_running()
    }

    pub fn queued_tasks(&self) -> Vec<Task> {
        let inner = self.core.inner.lock();
        inner
            .tasks
            .values()
            .filter(|te| te.task.status == TaskStatus::Queued)
            .map(|te| te.task.clone())
            .collect()
    }

    // -- control operations ---------------------------------------------------

    /// Signal a running task; a no-op (not an error) if it isn't running.
    /// Unknown ids are the only error case.
    pub fn kill(&self, id: &TaskId, signal: Option<Signal>) -> Result<(), UserError> {
        let signal = signal.unwrap_or_default();
        let (pid, should_signal) = {
            let mut inner = self.core.inner.lock();
            let te = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| UserError::UnknownTask(id.to_string()))?;
            if te.task.status == TaskStatus::Running {
                te.task.mark_terminating(TaskStatus::Killed);
                (te.task.pid, true)
            } else {
                (0, false)
            }
        };
        if should_signal {
            let _ = send_signal(pid, signal);
        }
        Ok(())
    }

    /// Forward bytes to a running task's stdin. Silent no-op if the task
    /// isn't running or has already closed stdin; unknown ids error.
    pub fn write(&self, id: &TaskId, data: &[u8]) -> Result<(), UserError> {
        let inner = self.core.inner.lock();
        let te = inner
            .tasks
            .get(id)
            .ok_or_else(|| UserError::UnknownTask(id.to_string()))?;
        if let Some(handle) = &te.handle {
            handle.write(data);
        }
        Ok(())
    }

    pub fn kill_all(&self, signal: Option<Signal>) -> Vec<TaskId> {
        let ids: Vec<TaskId> = {
            let inner = self.core.inner.lock();
            inner
                .tasks
                .values()
                .filter(|te| te.task.status == TaskStatus::Running)
                .map(|te| te.task.id.clone())
                .collect()
        };
        for id in &ids {
            let _ = self.kill(id, signal);
        }
        ids
    }

    pub fn kill_by_tag(&self, tag: &str, signal: Option<Signal>) -> Vec<TaskId> {
        let ids: Vec<TaskId> = {
            let inner = self.core.inner.lock();
            inner
                .tasks
                .values()
                .filter(|te| te.task.status == TaskStatus::Running && te.task.has_tag(tag))
                .map(|te| te.task.id.clone())
                .collect()
        };
        for id in &ids {
            let _ = self.kill(id, signal);
        }
        ids
    }

    /// Cancel a task: effective while queued (removed from the queue,
    /// marked `start-failed`) or while running (delegates to `kill`).
    /// Returns `Ok(false)` for an already-terminal task, `Err` for an
    /// unknown id.
    pub fn cancel_task(&self, id: &TaskId) -> Result<bool, UserError> {
        let status = {
            let inner = self.core.inner.lock();
            inner
                .tasks
                .get(id)
                .map(|te| te.task.status)
                .ok_or_else(|| UserError::UnknownTask(id.to_string()))?
        };
        match status {
            TaskStatus::Queued => {
                let now = self.core.clock.now_ms();
                let queue_id = {
                    let mut inner = self.core.inner.lock();
                    let te = inner
                        .tasks
                        .get_mut(id)
                        .ok_or_else(|| UserError::UnknownTask(id.to_string()))?;
                    if let Some(q) = te.task.queue.as_ref() {
                        q.cancel.cancel();
                    }
                    te.task
                        .queue
                        .as_ref()
                        .map(|q| q.queue_id.clone())
                        .unwrap_or_else(|| id.to_string())
                };
                {
                    let mut inner = self.core.inner.lock();
                    inner.scheduler.remove(&queue_id);
                }
                self.fail_queued_entry(id, now);
                self.core.queue_condition.notify_waiters();
                Ok(true)
            }
            TaskStatus::Running => {
                self.kill(id, None)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Narrower than [`Self::cancel_task`]: only cancels a still-queued
    /// task, and never reaches for `kill` on a running one (used by
    /// `TaskHandle::cancel`, spec §4.H). Returns `Ok(false)` without
    /// touching anything if the task isn't queued.
    pub fn cancel_if_queued(&self, id: &TaskId) -> Result<bool, UserError> {
        let is_queued = {
            let inner = self.core.inner.lock();
            let te = inner
                .tasks
                .get(id)
                .ok_or_else(|| UserError::UnknownTask(id.to_string()))?;
            te.task.status == TaskStatus::Queued
        };
        if is_queued {
            self.cancel_task(id)
        } else {
            Ok(false)
        }
    }

    /// Cancel every task matching `pred`, returning the ids actually
    /// cancelled.
    pub fn cancel_tasks(&self, pred: impl Fn(&Task) -> bool) -> Vec<TaskId> {
        let ids: Vec<TaskId> = {
            let inner = self.core.inner.lock();
            inner
                .tasks
                .values()
                .filter(|te| pred(&te.task))
                .map(|te| te.task.id.clone())
                .collect()
        };
        ids.into_iter()
            .filter(|id| matches!(self.cancel_task(id), Ok(true)))
            .collect()
    }

    /// Reprioritize a still-queued task. Returns `false` if unknown or no
    /// longer queued.
    pub fn reprioritize_task(&self, id: &TaskId, priority: i64) -> bool {
        let mut inner = self.core.inner.lock();
        let Some(te) = inner.tasks.get_mut(id) else { return false };
        if te.task.status != TaskStatus::Queued {
            return false;
        }
        let queue_id = te
            .task
            .queue
            .as_ref()
            .map(|q| q.queue_id.clone())
            .unwrap_or_else(|| id.to_string());
        let ok = inner.scheduler.set_priority(&queue_id, priority);
        if ok {
            if let Some(q) = te.task.queue.as_mut() {
                q.priority = priority;
            }
        }
        ok
    }

    // -- waiting ---------------------------------------------------------------

    /// Resolves once `id` leaves `queued`: `Ok(())` once running (or already
    /// terminal via the direct path), `Err(StartFailed)` if it never ran.
    pub async fn wait_to_start(&self, id: &TaskId) -> Result<(), WaitError> {
        let rx = {
            let mut inner = self.core.inner.lock();
            let te = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| WaitError::Unknown(id.to_string()))?;
            match te.task.status {
                TaskStatus::Queued => {
                    let (tx, rx) = oneshot::channel();
                    te.start_waiters.push(tx);
                    Some(rx)
                }
                TaskStatus::StartFailed => {
                    return Err(WaitError::StartFailed(te.task.start_error.clone().unwrap_or_default()))
                }
                _ => None,
            }
        };
        if let Some(rx) = rx {
            return rx.await.unwrap_or(Err(WaitError::StartFailed("cancelled".into())));
        }
        Ok(())
    }

    /// Resolves once `id` reaches a terminal status.
    pub async fn wait_for_task(&self, id: &TaskId) -> Result<ExitResult, WaitError> {
        let rx = {
            let mut inner = self.core.inner.lock();
            let te = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| WaitError::Unknown(id.to_string()))?;
            if te.task.status.is_terminal() {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                te.terminal_waiters.push(tx);
                Some(rx)
            }
        };
        if let Some(rx) = rx {
            let _ = rx.await;
        }
        let inner = self.core.inner.lock();
        let te = inner
            .tasks
            .get(id)
            .ok_or_else(|| WaitError::Unknown(id.to_string()))?;
        if te.task.status == TaskStatus::StartFailed {
            return Err(WaitError::StartFailed(te.task.start_error.clone().unwrap_or_default()));
        }
        Ok(Self::build_exit_result(&te.task))
    }

    fn build_exit_result(task: &Task) -> ExitResult {
        let log = std::fs::read_to_string(&task.log_path).unwrap_or_default();
        let duration_ms = match (task.spawned_at_ms, task.exited_at_ms) {
            (Some(s), Some(e)) => e.saturating_sub(s),
            _ => 0,
        };
        ExitResult {
            task_id: task.id.clone(),
            exit_code: task.exit_code,
            signalled: matches!(task.status, TaskStatus::Killed | TaskStatus::Timeout),
            duration_ms,
            log,
            task: Some(task.clone()),
        }
    }

    /// Wait for every id in `ids` (or every currently-registered task if
    /// `None`) to finish, collecting a result for each — failures included,
    /// never short-circuiting.
    pub async fn wait_for_all(&self, ids: Option<Vec<TaskId>>) -> Vec<ExitResult> {
        let ids = ids.unwrap_or_else(|| self.list().into_iter().map(|t| t.id).collect());
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.wait_for_task(&id).await {
                Ok(r) => results.push(r),
                Err(WaitError::StartFailed(msg)) => {
                    let task = self.get(&id);
                    results.push(ExitResult {
                        task_id: id,
                        exit_code: Some(-1),
                        signalled: false,
                        duration_ms: 0,
                        log: msg,
                        task,
                    });
                }
                Err(WaitError::Unknown(msg)) => {
                    results.push(ExitResult {
                        task_id: id,
                        exit_code: Some(-1),
                        signalled: false,
                        duration_ms: 0,
                        log: msg,
                        task: None,
                    });
                }
            }
        }
        results
    }

    async fn wait_for_queue_condition(&self, cond: impl Fn(&Inner) -> bool) {
        loop {
            let notified = self.core.queue_condition.notified();
            let ready = {
                let inner = self.core.inner.lock();
                cond(&inner)
            };
            if ready {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for_queue_idle(&self) {
        self.wait_for_queue_condition(|inner| inner.scheduler.queue_is_empty() && inner.scheduler.running() == 0)
            .await;
    }

    pub async fn wait_for_queue_empty(&self) {
        self.wait_for_queue_condition(|inner| inner.scheduler.queue_is_empty()).await;
    }

    pub async fn wait_for_queue_size_less_than(&self, n: usize) {
        self.wait_for_queue_condition(move |inner| inner.scheduler.queue_len() < n).await;
    }

    // -- configuration ---------------------------------------------------------

    pub fn set_concurrency(&self, n: i64) -> Result<(), UserError> {
        let concurrency = Concurrency::from_signed(n)?;
        {
            let mut inner = self.core.inner.lock();
            inner.scheduler.set_concurrency(concurrency);
        }
        self.core.queue_condition.notify_waiters();
        self.dispatch();
        Ok(())
    }

    pub fn set_concurrency_unlimited(&self) {
        {
            let mut inner = self.core.inner.lock();
            inner.scheduler.set_concurrency(Concurrency::Unlimited);
        }
        self.core.queue_condition.notify_waiters();
        self.dispatch();
    }

    pub fn set_queueing_enabled(&self, enabled: bool) {
        let mut inner = self.core.inner.lock();
        inner.scheduler.set_queueing_enabled(enabled);
    }

    pub fn queueing_enabled(&self) -> bool {
        let inner = self.core.inner.lock();
        inner.scheduler.queueing_enabled()
    }

    /// Validates the "both-or-neither" rule that interval/cap must satisfy
    /// before constructing the `RateLimit` itself.
    pub fn validate_rate_limit_params(
        interval_ms: Option<u64>,
        cap: Option<usize>,
    ) -> Result<Option<(u64, usize)>, UserError> {
        match (interval_ms, cap) {
            (Some(i), Some(c)) => Ok(Some((i, c))),
            (None, None) => Ok(None),
            _ => Err(UserError::IncompleteRateLimit),
        }
    }

    pub fn set_rate_limit(&self, params: Option<(u64, usize)>) -> Result<(), UserError> {
        let rl = match params {
            Some((interval, cap)) => Some(RateLimit::new(interval, cap)?),
            None => None,
        };
        let mut inner = self.core.inner.lock();
        inner.scheduler.set_rate_limit(rl);
        Ok(())
    }

    pub fn pause_queue(&self) {
        let mut inner = self.core.inner.lock();
        inner.scheduler.pause();
    }

    pub fn resume_queue(&self) {
        {
            let mut inner = self.core.inner.lock();
            inner.scheduler.resume();
        }
        self.dispatch();
    }

    pub fn is_paused(&self) -> bool {
        let inner = self.core.inner.lock();
        inner.scheduler.is_paused()
    }

    /// Drop every waiting (not yet dispatched) task, marking each
    /// `start-failed`: a cleared queue entry has nowhere else to go but
    /// terminal.
    pub fn clear_queue(&self) -> Vec<TaskId> {
        let now = self.core.clock.now_ms();
        let dropped = {
            let mut inner = self.core.inner.lock();
            inner.scheduler.clear()
        };
        let mut affected = Vec::with_capacity(dropped.len());
        for entry in dropped {
            self.fail_queued_entry(&entry.task_id, now);
            affected.push(entry.task_id);
        }
        self.core.queue_condition.notify_waiters();
        affected
    }

    pub fn get_queue_stats(&self) -> QueueStats {
        let now = self.core.clock.now_ms();
        let inner = self.core.inner.lock();
        let size = inner.scheduler.queue_len();
        QueueStats {
            size,
            pending: size,
            paused: inner.scheduler.is_paused(),
            total_added: inner.stats.total_added(),
            total_completed: inner.stats.total_completed(),
            total_failed: inner.stats.total_failed(),
            total_cancelled: inner.stats.total_cancelled(),
            avg_wait_time_ms: inner.stats.avg_wait_time_ms(),
            avg_run_time_ms: inner.stats.avg_run_time_ms(),
            throughput_per_sec: inner.stats.throughput(now),
            utilization_pct: inner.scheduler.utilization() * 100.0,
        }
    }

    pub fn get_health(&self) -> HealthReport {
        let stats = self.get_queue_stats();
        let concurrency_cap = {
            let inner = self.core.inner.lock();
            match inner.scheduler.concurrency() {
                Concurrency::Limited(n) => Some(n),
                Concurrency::Unlimited => None,
            }
        };
        let settled = stats.total_completed + stats.total_failed;
        let failure_ratio = if settled == 0 {
            0.0
        } else {
            stats.total_failed as f64 / settled as f64
        };
        derive_health(
            stats.utilization_pct,
            stats.avg_wait_time_ms,
            current_rss_bytes(),
            failure_ratio,
            stats.size,
            concurrency_cap,
        )
    }

    // -- shutdown ---------------------------------------------------------------

    /// Stop accepting new work, optionally cancel or pause what's still
    /// queued, wait (up to `timeout_ms`, default 30s) for running tasks to
    /// finish, and optionally SIGKILL stragglers.
    pub async fn shutdown(&self, opts: ShutdownOptions) -> ShutdownReport {
        {
            let mut inner = self.core.inner.lock();
            inner.accepting = false;
        }

        let cancelled = if opts.cancel_pending {
            self.cancel_tasks(|t| t.status == TaskStatus::Queued)
        } else {
            let mut inner = self.core.inner.lock();
            inner.scheduler.pause();
            Vec::new()
        };
        self.core.queue_condition.notify_waiters();

        let start = self.core.clock.instant();
        let timeout = opts
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(30));
        let wait = self.wait_for_queue_condition(|inner| inner.scheduler.running() == 0);
        let _ = tokio::time::timeout(timeout, wait).await;
        let waited_ms = self.core.clock.instant().saturating_duration_since(start).as_millis() as u64;

        let mut force_killed = Vec::new();
        if opts.force {
            let running_ids: Vec<TaskId> = {
                let inner = self.core.inner.lock();
                inner
                    .tasks
                    .values()
                    .filter(|te| te.task.status == TaskStatus::Running)
                    .map(|te| te.task.id.clone())
                    .collect()
            };
            for id in running_ids {
                if self.kill(&id, Some(Signal::Kill)).is_ok() {
                    force_killed.push(id);
                }
            }
        }

        ShutdownReport {
            cancelled,
            force_killed,
            waited_ms,
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
