// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Debounced tail of a task's log file, feeding `onChange` hooks.
//!
//! Created only when a task has `onChange` callbacks. Watches the file with
//! `notify`; on failure to install a watch, falls back to polling rather
//! than erroring out.

use crate::hooks::{HookCallback, HookContext, HookDispatcher, HookKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskyard_core::Task;
use tokio::sync::{mpsc, oneshot};

const DEBOUNCE: Duration = Duration::from_millis(100);
const POLL_FALLBACK_INTERVAL: Duration = Duration::from_millis(250);

/// Handle to a running watcher task; dropping or calling `shutdown` stops it.
pub struct LogWatcher {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl LogWatcher {
    /// Spawn a watcher for `path`, dispatching `onChange` to `callbacks`
    /// whenever new bytes are appended. `task_snapshot` produces the `Task`
    /// to attach to each dispatched context (cheap clone of the registry's
    /// current copy).
    pub fn spawn(
        path: PathBuf,
        callbacks: Vec<HookCallback>,
        dispatcher: Arc<HookDispatcher>,
        task_snapshot: impl Fn() -> Option<Task> + Send + Sync + 'static,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(watch_loop(path, callbacks, dispatcher, Box::new(task_snapshot), shutdown_rx));
        Self {
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn install_watch(path: &std::path::Path, tx: mpsc::Sender<()>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = tx.blocking_send(());
        }
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

async fn watch_loop(
    path: PathBuf,
    callbacks: Vec<HookCallback>,
    dispatcher: Arc<HookDispatcher>,
    task_snapshot: Box<dyn Fn() -> Option<Task> + Send + Sync>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut offset: u64 = 0;
    let (tx, mut file_rx) = mpsc::channel(32);
    let watcher_guard = match install_watch(&path, tx) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "file watcher failed, using fallback polling");
            None
        }
    };

    loop {
        tokio::select! {
            maybe = file_rx.recv(), if watcher_guard.is_some() => {
                if maybe.is_none() {
                    break;
                }
                drain_debounced(&mut file_rx).await;
                read_and_dispatch(&path, &mut offset, &callbacks, &dispatcher, task_snapshot.as_ref()).await;
            }
            _ = tokio::time::sleep(POLL_FALLBACK_INTERVAL), if watcher_guard.is_none() => {
                read_and_dispatch(&path, &mut offset, &callbacks, &dispatcher, task_snapshot.as_ref()).await;
            }
            _ = &mut shutdown_rx => {
                break;
            }
        }
    }
}

/// Coalesce a burst of filesystem events into one read with a ~100ms
/// debounce window.
async fn drain_debounced(file_rx: &mut mpsc::Receiver<()>) {
    let deadline = tokio::time::sleep(DEBOUNCE);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            more = file_rx.recv() => {
                if more.is_none() {
                    break;
                }
            }
        }
    }
}

async fn read_and_dispatch(
    path: &std::path::Path,
    offset: &mut u64,
    callbacks: &[HookCallback],
    dispatcher: &HookDispatcher,
    task_snapshot: &(dyn Fn() -> Option<Task> + Send + Sync),
) {
    let Ok(mut file) = File::open(path) else {
        tracing::debug!(path = %path.display(), "log file disappeared, skipping onChange read");
        return;
    };
    let len = match file.metadata() {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if len < *offset {
        // Truncation: reset offset without emitting.
        *offset = 0;
        return;
    }
    if len == *offset {
        return;
    }
    if file.seek(SeekFrom::Start(*offset)).is_err() {
        return;
    }
    let mut buf = Vec::with_capacity((len - *offset) as usize);
    if file.read_to_end(&mut buf).is_err() {
        return;
    }
    *offset = len;
    if buf.is_empty() {
        return;
    }
    let Some(task) = task_snapshot() else {
        return;
    };
    dispatcher
        .dispatch(HookKind::OnChange, callbacks, HookContext::changed(task, buf))
        .await;
}
