// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! The single writer of a task's append-only log file.
//!
//! Opened at admission so early pipe writes never race the first `spawn`.
//! Every write also pokes the idle watchdog by updating `last_activity_ms`,
//! which the executor's idle timer reads without needing a reference back
//! to the sink itself.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub struct LogSink {
    file: std::sync::Mutex<File>,
    path: PathBuf,
    bytes_written: AtomicU64,
    last_activity_ms: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl LogSink {
    /// Create (or truncate) the log file at `path`. Called at task admission.
    pub fn create(path: PathBuf, now_ms: u64) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            file: std::sync::Mutex::new(file),
            path,
            bytes_written: AtomicU64::new(0),
            last_activity_ms: Arc::new(AtomicU64::new(now_ms)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }

    /// Shared handle to the idle watchdog's "last saw output at" clock,
    /// so the executor's idle timer can read it without a sink reference.
    pub fn last_activity_ms(&self) -> Arc<AtomicU64> {
        self.last_activity_ms.clone()
    }

    /// Append `bytes` and reset the idle watchdog. No-op once closed.
    pub fn write(&self, bytes: &[u8], now_ms: u64) -> std::io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if bytes.is_empty() {
            return Ok(());
        }
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(bytes)?;
        file.flush()?;
        self.bytes_written.fetch_add(bytes.len() as u64, Ordering::SeqCst);
        self.last_activity_ms.store(now_ms, Ordering::SeqCst);
        Ok(())
    }

    /// Idempotent; called exactly once by the exit observer on terminal
    /// transition, but safe to call more than once.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_appends_and_advances_last_activity() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::create(dir.path().join("t1.log"), 0).unwrap();
        sink.write(b"hello ", 10).unwrap();
        sink.write(b"world", 20).unwrap();
        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(contents, "hello world");
        assert_eq!(sink.bytes_written(), 11);
        assert_eq!(sink.last_activity_ms().load(Ordering::SeqCst), 20);
    }

    #[test]
    fn write_after_close_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::create(dir.path().join("t1.log"), 0).unwrap();
        sink.write(b"before", 5).unwrap();
        sink.close();
        sink.write(b"after", 6).unwrap();
        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(contents, "before");
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::create(dir.path().join("t1.log"), 0).unwrap();
        sink.close();
        sink.close();
        assert!(sink.is_closed());
    }

    #[test]
    fn create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c/t1.log");
        let sink = LogSink::create(nested.clone(), 0).unwrap();
        sink.write(b"x", 1).unwrap();
        assert!(nested.exists());
    }
}
