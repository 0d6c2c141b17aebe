// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Spawns a child process, pipes stdout/stderr to the `LogSink`, watches for
//! idleness, and observes exit.
//!
//! Generic over `Clock` (not a trait object: `Clock: Clone` makes it
//! non-dyn-compatible, the same constraint a generic `Executor<S, A, N, C>`
//! lives under elsewhere in this workspace). Spawning is synchronous from
//! the caller's point of view; idle-watchdog and exit-observation run as
//! independent tokio tasks that report back through a caller-supplied sink
//! closure, so the Supervisor can fold their results into its own
//! single-lock state machine without blocking on either.

use crate::log_sink::LogSink;
use crate::signal::{send_signal, Signal};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskyard_core::{Clock, SpawnError, TaskId};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

/// Default idle timeout, used when a task doesn't specify one.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PIPE_BUF_SIZE: usize = 8192;

/// Reported asynchronously by the spawned watchdog/exit-observer tasks.
/// The Supervisor applies these under its single lock.
#[derive(Debug)]
pub enum ExecutorEvent {
    IdleTimeout { id: TaskId, at_ms: u64 },
    Exited { id: TaskId, code: Option<i32>, at_ms: u64 },
}

pub type EventSink = Arc<dyn Fn(ExecutorEvent) + Send + Sync>;

/// Caller-facing reference to a still-running child: lets the Supervisor
/// forward stdin writes without exposing the child process itself.
pub struct RunningHandle {
    pub pid: i64,
    stdin_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl RunningHandle {
    /// Write to the child's stdin. Silent no-op if stdin is closed or the
    /// child never had a stdin pipe.
    pub fn write(&self, bytes: &[u8]) {
        let _ = self.stdin_tx.send(bytes.to_vec());
    }
}

pub struct ProcessExecutor<C: Clock> {
    clock: C,
}

impl<C: Clock> ProcessExecutor<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Fork/exec `cmd[0] cmd[1..]`. On synchronous failure returns
    /// `SpawnError` and touches nothing else; the caller (Supervisor) is
    /// responsible for marking the task `start-failed` and dispatching
    /// `onTaskStartFail`.
    pub fn spawn(
        &self,
        id: TaskId,
        cmd: &[String],
        log_sink: Arc<LogSink>,
        idle_timeout: Option<Duration>,
        events: EventSink,
    ) -> Result<RunningHandle, SpawnError> {
        let Some(program) = cmd.first() else {
            return Err(SpawnError::EmptyCommand);
        };

        let mut command = tokio::process::Command::new(program);
        command
            .args(&cmd[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let mut child = command.spawn().map_err(|e| SpawnError::Exec {
            program: program.clone(),
            message: e.to_string(),
        })?;

        let pid = child.id().map(|p| p as i64).unwrap_or(-1);
        tracing::info!(%id, pid, cmd = ?cmd, "spawned task");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        if let Some(mut stdin) = stdin {
            tokio::spawn(async move {
                use tokio::io::AsyncWriteExt;
                while let Some(bytes) = stdin_rx.recv().await {
                    if stdin.write_all(&bytes).await.is_err() {
                        break;
                    }
                }
            });
        }

        if let Some(stdout) = stdout {
            spawn_pipe_reader(stdout, log_sink.clone(), self.clock.clone());
        }
        if let Some(stderr) = stderr {
            spawn_pipe_reader(stderr, log_sink.clone(), self.clock.clone());
        }

        let finished = Arc::new(AtomicBool::new(false));
        let idle_timeout = idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT);
        spawn_idle_watchdog(
            id.clone(),
            pid,
            idle_timeout,
            log_sink.last_activity_ms(),
            finished.clone(),
            self.clock.clone(),
            events.clone(),
        );
        spawn_exit_observer(id, child, log_sink, finished, self.clock.clone(), events);

        Ok(RunningHandle { pid, stdin_tx })
    }
}

fn spawn_pipe_reader<R, C>(mut pipe: R, sink: Arc<LogSink>, clock: C)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    C: Clock,
{
    tokio::spawn(async move {
        let mut buf = [0u8; PIPE_BUF_SIZE];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if sink.write(&buf[..n], clock.now_ms()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_idle_watchdog<C: Clock>(
    id: TaskId,
    pid: i64,
    idle_timeout: Duration,
    last_activity_ms: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    clock: C,
    events: EventSink,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            if finished.load(Ordering::SeqCst) {
                break;
            }
            let now = clock.now_ms();
            let last = last_activity_ms.load(Ordering::SeqCst);
            if now.saturating_sub(last) >= idle_timeout.as_millis() as u64 {
                tracing::warn!(%id, idle_ms = idle_timeout.as_millis() as u64, "idle watchdog fired, sending SIGKILL");
                let _ = send_signal(pid, Signal::Kill);
                events(ExecutorEvent::IdleTimeout { id, at_ms: now });
                break;
            }
        }
    });
}

fn spawn_exit_observer<C: Clock>(
    id: TaskId,
    mut child: tokio::process::Child,
    log_sink: Arc<LogSink>,
    finished: Arc<AtomicBool>,
    clock: C,
    events: EventSink,
) {
    tokio::spawn(async move {
        let status = child.wait().await;
        finished.store(true, Ordering::SeqCst);
        log_sink.close();
        let code = status.ok().and_then(|s| s.code());
        let at_ms = clock.now_ms();
        tracing::info!(%id, code = ?code, "task exited");
        events(ExecutorEvent::Exited { id, code, at_ms });
    });
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
