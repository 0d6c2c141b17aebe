// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Fans lifecycle events out to user-supplied callbacks. Each callback gets
//! an independent deadline; a callback that panics, hangs past its deadline,
//! or otherwise misbehaves is logged and never faults the dispatch loop.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use taskyard_core::Task;

/// Default per-callback deadline.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    OnSuccess,
    OnFailure,
    OnTerminated,
    OnTimeout,
    OnTaskStartFail,
    OnChange,
}

impl HookKind {
    fn label(self) -> &'static str {
        match self {
            HookKind::OnSuccess => "on_success",
            HookKind::OnFailure => "on_failure",
            HookKind::OnTerminated => "on_terminated",
            HookKind::OnTimeout => "on_timeout",
            HookKind::OnTaskStartFail => "on_task_start_fail",
            HookKind::OnChange => "on_change",
        }
    }
}

/// Context passed to a callback invocation. `change` is populated only for
/// `onChange` dispatches (new bytes read by the `LogWatcher`).
#[derive(Clone)]
pub struct HookContext {
    pub task: Task,
    pub change: Option<Vec<u8>>,
}

impl HookContext {
    pub fn terminal(task: Task) -> Self {
        Self { task, change: None }
    }

    pub fn changed(task: Task, bytes: Vec<u8>) -> Self {
        Self {
            task,
            change: Some(bytes),
        }
    }
}

/// A user-supplied lifecycle callback. Boxed rather than generic so
/// `HookSet`s can be built up and merged at runtime without the caller
/// naming a concrete closure type.
pub type HookCallback = Arc<dyn Fn(HookContext) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Per-kind callback lists for one scope (global, or a single task's own
/// `start` call). `merge` concatenates two scopes kind-by-kind, global
/// first, preserving registration order.
#[derive(Clone, Default)]
pub struct HookSet {
    pub on_success: Vec<HookCallback>,
    pub on_failure: Vec<HookCallback>,
    pub on_terminated: Vec<HookCallback>,
    pub on_timeout: Vec<HookCallback>,
    pub on_task_start_fail: Vec<HookCallback>,
    pub on_change: Vec<HookCallback>,
}

impl HookSet {
    pub fn is_empty(&self) -> bool {
        self.on_success.is_empty()
            && self.on_failure.is_empty()
            && self.on_terminated.is_empty()
            && self.on_timeout.is_empty()
            && self.on_task_start_fail.is_empty()
            && self.on_change.is_empty()
    }

    pub fn merge(global: &HookSet, task_local: &HookSet) -> HookSet {
        fn cat(a: &[HookCallback], b: &[HookCallback]) -> Vec<HookCallback> {
            a.iter().chain(b.iter()).cloned().collect()
        }
        HookSet {
            on_success: cat(&global.on_success, &task_local.on_success),
            on_failure: cat(&global.on_failure, &task_local.on_failure),
            on_terminated: cat(&global.on_terminated, &task_local.on_terminated),
            on_timeout: cat(&global.on_timeout, &task_local.on_timeout),
            on_task_start_fail: cat(&global.on_task_start_fail, &task_local.on_task_start_fail),
            on_change: cat(&global.on_change, &task_local.on_change),
        }
    }

    pub fn for_kind(&self, kind: HookKind) -> &[HookCallback] {
        match kind {
            HookKind::OnSuccess => &self.on_success,
            HookKind::OnFailure => &self.on_failure,
            HookKind::OnTerminated => &self.on_terminated,
            HookKind::OnTimeout => &self.on_timeout,
            HookKind::OnTaskStartFail => &self.on_task_start_fail,
            HookKind::OnChange => &self.on_change,
        }
    }
}

/// Invokes callback lists with per-call timeout isolation.
pub struct HookDispatcher {
    timeout: Duration,
}

impl HookDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Dispatch `kind` to every callback in `callbacks`, in order. A
    /// callback that exceeds `timeout` or panics is logged and skipped;
    /// the rest of the list still runs. Each callback is driven on its own
    /// spawned task so a panic mid-poll unwinds only that task, not this
    /// dispatch loop — `catch_unwind` alone only guards future
    /// *construction*, not polling.
    pub async fn dispatch(&self, kind: HookKind, callbacks: &[HookCallback], ctx: HookContext) {
        for cb in callbacks {
            let task_id = ctx.task.id.clone();
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| cb(ctx.clone())));
            let fut = match outcome {
                Ok(fut) => fut,
                Err(_) => {
                    tracing::warn!(kind = kind.label(), %task_id, "hook callback panicked while constructing its future");
                    continue;
                }
            };
            let handle = tokio::spawn(fut);
            match tokio::time::timeout(self.timeout, handle).await {
                Ok(Ok(())) => {
                    tracing::debug!(kind = kind.label(), %task_id, "hook callback completed");
                }
                Ok(Err(join_err)) => {
                    tracing::warn!(kind = kind.label(), %task_id, error = %join_err, "hook callback panicked");
                }
                Err(_) => {
                    tracing::warn!(kind = kind.label(), %task_id, timeout_ms = self.timeout.as_millis() as u64, "hook callback exceeded its deadline");
                }
            }
        }
    }
}

impl Default for HookDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_HOOK_TIMEOUT)
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
