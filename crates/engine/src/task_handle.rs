// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! A lightweight reference to one task, returned alongside the `Task`
//! snapshot by `Supervisor::start_with_handle`.
//!
//! Cheap to clone (wraps a cloned `Supervisor` plus the task's id) and
//! never itself holds the registry lock across an `.await` — every method
//! just delegates to the matching `Supervisor` operation.

use crate::signal::Signal;
use crate::supervisor::{ExitResult, Supervisor, WaitError};
use taskyard_core::{Clock, Task, TaskId, UserError};

pub struct TaskHandle<C: Clock = taskyard_core::SystemClock> {
    supervisor: Supervisor<C>,
    task_id: TaskId,
}

impl<C: Clock> Clone for TaskHandle<C> {
    fn clone(&self) -> Self {
        Self {
            supervisor: self.supervisor.clone(),
            task_id: self.task_id.clone(),
        }
    }
}

impl<C: Clock> TaskHandle<C> {
    pub(crate) fn new(supervisor: Supervisor<C>, task_id: TaskId) -> Self {
        Self { supervisor, task_id }
    }

    pub fn id(&self) -> &TaskId {
        &self.task_id
    }

    /// Current snapshot, or `None` if the task has somehow fallen out of
    /// the registry (never happens in practice: tasks are never removed).
    pub fn info(&self) -> Option<Task> {
        self.supervisor.get(&self.task_id)
    }

    /// Resolves when the task leaves `queued`: `Ok(())` once running,
    /// `Err(StartFailed)` if it never ran.
    pub async fn wait_to_start(&self) -> Result<(), WaitError> {
        self.supervisor.wait_to_start(&self.task_id).await
    }

    /// Resolves once the task reaches a terminal status.
    pub async fn on_completed(&self) -> Result<ExitResult, WaitError> {
        self.supervisor.wait_for_task(&self.task_id).await
    }

    /// `wait_to_start` then `on_completed`, the common "run to completion"
    /// sequence.
    pub async fn wait_to_finish(&self) -> Result<ExitResult, WaitError> {
        self.wait_to_start().await?;
        self.on_completed().await
    }

    /// Effective only while the task is still queued; a no-op (`Ok(false)`)
    /// for a running or already-terminal task. Unlike `Supervisor::cancel_task`
    /// (which also kills a running task), a handle's `cancel` never reaches
    /// for `kill` — callers that want that use `kill` explicitly.
    pub fn cancel(&self) -> Result<bool, UserError> {
        self.supervisor.cancel_if_queued(&self.task_id)
    }

    pub fn kill(&self, signal: Option<Signal>) -> Result<(), UserError> {
        self.supervisor.kill(&self.task_id, signal)
    }
}
