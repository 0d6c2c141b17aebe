// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Admission control: concurrency cap, optional rate-limit window,
//! pause/resume/clear, and the priority queue the dispatch loop drains.
//!
//! The dispatch loop itself lives in [`crate::supervisor::Supervisor`] — the
//! `Scheduler` here is the gate it consults, not an independent loop. This
//! keeps every registry/queue mutation inside the Supervisor's single lock.

use crate::queue::{PriorityQueue, QueueEntry};
use std::collections::VecDeque;
use taskyard_core::task::AgingConfig;
use taskyard_core::{TaskId, UserError};

/// Concurrency cap is treated as unbounded once it reaches this threshold.
/// At or above it, every submission takes the direct path regardless of
/// `immediate`.
pub const QUEUE_CONCURRENCY_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Limited(usize),
    Unlimited,
}

impl Concurrency {
    pub fn from_signed(n: i64) -> Result<Self, UserError> {
        if n < 0 {
            return Err(UserError::NegativeConcurrency);
        }
        Ok(Concurrency::Limited(n as usize))
    }

    fn allows(self, running: usize) -> bool {
        match self {
            Concurrency::Limited(n) => running < n,
            Concurrency::Unlimited => true,
        }
    }

    /// Whether this cap is below the admission threshold that makes
    /// queueing meaningful at all.
    fn is_queueable(self) -> bool {
        match self {
            Concurrency::Limited(n) => n < QUEUE_CONCURRENCY_THRESHOLD,
            Concurrency::Unlimited => false,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::Unlimited
    }
}

/// Sliding-window start-rate limiter: at most `cap` starts per `interval_ms`.
#[derive(Debug, Clone)]
pub struct RateLimit {
    interval_ms: u64,
    cap: usize,
    starts: VecDeque<u64>,
}

impl RateLimit {
    pub fn new(interval_ms: u64, cap: usize) -> Result<Self, UserError> {
        if interval_ms == 0 || cap == 0 {
            return Err(UserError::NonPositiveRateLimit);
        }
        Ok(Self {
            interval_ms,
            cap,
            starts: VecDeque::new(),
        })
    }

    fn evict_stale(&mut self, now_ms: u64) {
        let floor = now_ms.saturating_sub(self.interval_ms);
        while matches!(self.starts.front(), Some(&t) if t < floor) {
            self.starts.pop_front();
        }
    }

    fn allows(&mut self, now_ms: u64) -> bool {
        self.evict_stale(now_ms);
        self.starts.len() < self.cap
    }

    fn record(&mut self, now_ms: u64) {
        self.starts.push_back(now_ms);
    }

    /// Epoch-ms at which the window will next admit a start, if currently full.
    pub fn next_slot_at(&self) -> Option<u64> {
        self.starts.front().map(|&t| t + self.interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Direct,
    Queued,
}

/// Result of the execution-path decision, with a human-readable rationale
/// for diagnostics.
#[derive(Debug, Clone)]
pub struct PathDecision {
    pub path: ExecutionPath,
    pub reason: &'static str,
}

/// Bundles the waiting [`PriorityQueue`] with concurrency/rate-limit policy
/// and pause state.
pub struct Scheduler {
    queue: PriorityQueue,
    concurrency: Concurrency,
    rate_limit: Option<RateLimit>,
    paused: bool,
    /// Mirrors the `autoStart` queue option: when false, the scheduler
    /// never admits to the queue regardless of concurrency.
    queueing_enabled: bool,
    running: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            concurrency: Concurrency::Unlimited,
            rate_limit: None,
            paused: false,
            queueing_enabled: true,
            running: 0,
        }
    }

    /// Execution-path decision. `immediate` is the per-submission override
    /// (`TaskConfig::immediate` / `startImmediate`).
    pub fn decide_path(&self, immediate: bool) -> PathDecision {
        if immediate {
            return PathDecision {
                path: ExecutionPath::Direct,
                reason: "submitted with immediate=true, bypasses the queue",
            };
        }
        if !self.queueing_enabled {
            return PathDecision {
                path: ExecutionPath::Direct,
                reason: "queueing is disabled (autoStart=false)",
            };
        }
        if self.concurrency.is_queueable() {
            return PathDecision {
                path: ExecutionPath::Queued,
                reason: "concurrency is bounded and queueing is enabled",
            };
        }
        if self.rate_limit.is_some() {
            return PathDecision {
                path: ExecutionPath::Queued,
                reason: "rate limit configured; queued even under unbounded concurrency so the dispatch gate can pace starts",
            };
        }
        PathDecision {
            path: ExecutionPath::Direct,
            reason: "concurrency is unbounded or at/above the queueing threshold and no rate limit is configured",
        }
    }

    pub fn set_queueing_enabled(&mut self, enabled: bool) {
        self.queueing_enabled = enabled;
    }

    pub fn queueing_enabled(&self) -> bool {
        self.queueing_enabled && (self.concurrency.is_queueable() || self.rate_limit.is_some())
    }

    pub fn set_concurrency(&mut self, concurrency: Concurrency) {
        self.concurrency = concurrency;
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    pub fn set_rate_limit(&mut self, rate_limit: Option<RateLimit>) {
        self.rate_limit = rate_limit;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn utilization(&self) -> f64 {
        match self.concurrency {
            Concurrency::Limited(0) => 0.0,
            Concurrency::Limited(n) => self.running as f64 / n as f64,
            Concurrency::Unlimited => 0.0,
        }
    }

    pub fn enqueue(
        &mut self,
        task_id: TaskId,
        queue_id: impl Into<String>,
        base_priority: i64,
        aging: AgingConfig,
        queued_at_ms: u64,
    ) -> u64 {
        self.queue
            .enqueue(task_id, queue_id, base_priority, aging, queued_at_ms)
    }

    pub fn remove(&mut self, queue_id: &str) -> bool {
        self.queue.remove(queue_id)
    }

    pub fn set_priority(&mut self, queue_id: &str, new_priority: i64) -> bool {
        self.queue.set_priority(queue_id, new_priority)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_snapshot(&self) -> Vec<&QueueEntry> {
        self.queue.snapshot()
    }

    /// Drop all waiting entries. The caller (Supervisor) decides what
    /// happens to their owning Tasks — marked `start-failed` here.
    pub fn clear(&mut self) -> Vec<QueueEntry> {
        self.queue.clear()
    }

    pub fn recompute_aging(&mut self, now_ms: u64) {
        self.queue.recompute_aging(now_ms);
    }

    /// True if, right now, the dispatch loop should attempt at least one
    /// more start: not paused, queue non-empty, a concurrency slot is free,
    /// and the rate-limit window (if any) allows one more start.
    fn can_dispatch(&mut self, now_ms: u64) -> bool {
        if self.paused || self.queue.is_empty() {
            return false;
        }
        if !self.concurrency.allows(self.running) {
            return false;
        }
        match &mut self.rate_limit {
            Some(rl) => rl.allows(now_ms),
            None => true,
        }
    }

    /// Pop the head entry for dispatch iff all gates are open; marks one
    /// concurrency slot and rate-limit start consumed. Returns `None` if
    /// any gate blocks (paused, empty, at-capacity, rate-limited).
    pub fn try_pop_for_dispatch(&mut self, now_ms: u64) -> Option<QueueEntry> {
        if !self.can_dispatch(now_ms) {
            return None;
        }
        let entry = self.queue.pop()?;
        self.running += 1;
        if let Some(rl) = &mut self.rate_limit {
            rl.record(now_ms);
        }
        Some(entry)
    }

    /// Epoch-ms of the next moment dispatch might become possible purely
    /// due to the rate-limit window rolling forward. `None` if no rate
    /// limit is set, the queue is empty, or a slot is already free right
    /// now.
    pub fn next_rate_limit_wakeup(&self, now_ms: u64) -> Option<u64> {
        if self.queue.is_empty() || self.paused {
            return None;
        }
        if !self.concurrency.allows(self.running) {
            return None;
        }
        let rl = self.rate_limit.as_ref()?;
        let next = rl.next_slot_at()?;
        if next > now_ms {
            Some(next)
        } else {
            None
        }
    }

    /// A direct-path task also occupies a logical slot while running, so
    /// `getHealth`/`getQueueStats` utilization reflects all running work,
    /// not just queue-dispatched work.
    pub fn note_direct_start(&mut self) {
        self.running += 1;
    }

    /// Called once per task that leaves `running`: a terminal transition,
    /// or a spawn failure that still consumed a slot and must release it.
    pub fn release_slot(&mut self) {
        self.running = self.running.saturating_sub(1);
    }
}
