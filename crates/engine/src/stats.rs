// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Statistics accumulators and derived health reporting.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bound on the rolling wait/run-time windows used for averages. Large
/// enough to smooth out noise, small enough that a long-lived supervisor
/// doesn't grow this unboundedly.
const WINDOW: usize = 512;

/// Monotonic counters plus bounded rolling windows of wait/run times, the
/// source data for [`QueueStats`] and [`HealthReport`].
#[derive(Debug)]
pub struct Stats {
    start_ms: u64,
    total_added: u64,
    total_completed: u64,
    total_failed: u64,
    total_cancelled: u64,
    wait_times_ms: VecDeque<u64>,
    run_times_ms: VecDeque<u64>,
}

impl Stats {
    pub fn new(now_ms: u64) -> Self {
        Self {
            start_ms: now_ms,
            total_added: 0,
            total_completed: 0,
            total_failed: 0,
            total_cancelled: 0,
            wait_times_ms: VecDeque::with_capacity(WINDOW),
            run_times_ms: VecDeque::with_capacity(WINDOW),
        }
    }

    pub fn record_added(&mut self) {
        self.total_added += 1;
    }

    pub fn record_completed(&mut self) {
        self.total_completed += 1;
    }

    pub fn record_failed(&mut self) {
        self.total_failed += 1;
    }

    pub fn record_cancelled(&mut self) {
        self.total_cancelled += 1;
    }

    fn push_bounded(ring: &mut VecDeque<u64>, value: u64) {
        if ring.len() == WINDOW {
            ring.pop_front();
        }
        ring.push_back(value);
    }

    pub fn record_wait(&mut self, ms: u64) {
        Self::push_bounded(&mut self.wait_times_ms, ms);
    }

    pub fn record_run(&mut self, ms: u64) {
        Self::push_bounded(&mut self.run_times_ms, ms);
    }

    fn avg(ring: &VecDeque<u64>) -> f64 {
        if ring.is_empty() {
            return 0.0;
        }
        ring.iter().sum::<u64>() as f64 / ring.len() as f64
    }

    pub fn avg_wait_time_ms(&self) -> f64 {
        Self::avg(&self.wait_times_ms)
    }

    pub fn avg_run_time_ms(&self) -> f64 {
        Self::avg(&self.run_times_ms)
    }

    /// Completed+failed tasks per second over the supervisor's wall-clock
    /// uptime.
    pub fn throughput(&self, now_ms: u64) -> f64 {
        let uptime_secs = (now_ms.saturating_sub(self.start_ms)) as f64 / 1000.0;
        if uptime_secs <= 0.0 {
            return 0.0;
        }
        (self.total_completed + self.total_failed) as f64 / uptime_secs
    }

    pub fn failure_ratio(&self) -> f64 {
        let settled = self.total_completed + self.total_failed;
        if settled == 0 {
            return 0.0;
        }
        self.total_failed as f64 / settled as f64
    }

    pub fn total_added(&self) -> u64 {
        self.total_added
    }
    pub fn total_completed(&self) -> u64 {
        self.total_completed
    }
    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }
    pub fn total_cancelled(&self) -> u64 {
        self.total_cancelled
    }
}

/// Snapshot returned by `Supervisor::get_queue_stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Entries currently waiting in the priority queue.
    pub size: usize,
    /// Alias for `size`, carried as the same value for callers that expect
    /// either name.
    pub pending: usize,
    pub paused: bool,
    pub total_added: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub avg_wait_time_ms: f64,
    pub avg_run_time_ms: f64,
    pub throughput_per_sec: f64,
    pub utilization_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        write!(f, "{s}")
    }
}

/// Snapshot returned by `Supervisor::get_health`. Utilization >90%, avg
/// wait >30s, RSS >500 MiB, or failure ratio >10% each push toward
/// `degraded`; a queue backlog beyond 10x concurrency is `unhealthy`
/// outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub utilization_pct: f64,
    pub avg_wait_time_ms: f64,
    pub rss_bytes: u64,
    pub failure_ratio: f64,
    pub queue_backlog: usize,
    pub reasons: Vec<String>,
}

const UTILIZATION_DEGRADED_PCT: f64 = 90.0;
const AVG_WAIT_DEGRADED_MS: f64 = 30_000.0;
const RSS_DEGRADED_BYTES: u64 = 500 * 1024 * 1024;
const FAILURE_RATIO_DEGRADED: f64 = 0.10;
const BACKLOG_UNHEALTHY_MULTIPLE: usize = 10;

#[allow(clippy::too_many_arguments)]
pub fn derive_health(
    utilization_pct: f64,
    avg_wait_time_ms: f64,
    rss_bytes: u64,
    failure_ratio: f64,
    queue_backlog: usize,
    concurrency_cap: Option<usize>,
) -> HealthReport {
    let mut reasons = Vec::new();
    let mut degraded = false;
    let mut unhealthy = false;

    if utilization_pct > UTILIZATION_DEGRADED_PCT {
        degraded = true;
        reasons.push(format!("utilization {utilization_pct:.1}% exceeds 90%"));
    }
    if avg_wait_time_ms > AVG_WAIT_DEGRADED_MS {
        degraded = true;
        reasons.push(format!("avg wait time {avg_wait_time_ms:.0}ms exceeds 30s"));
    }
    if rss_bytes > RSS_DEGRADED_BYTES {
        degraded = true;
        reasons.push(format!("RSS {rss_bytes} bytes exceeds 500MiB"));
    }
    if failure_ratio > FAILURE_RATIO_DEGRADED {
        degraded = true;
        reasons.push(format!("failure ratio {failure_ratio:.2} exceeds 10%"));
    }
    if let Some(cap) = concurrency_cap {
        if queue_backlog > cap.saturating_mul(BACKLOG_UNHEALTHY_MULTIPLE) {
            unhealthy = true;
            reasons.push(format!(
                "queue backlog {queue_backlog} exceeds 10x concurrency ({cap})"
            ));
        }
    }

    let status = if unhealthy {
        HealthStatus::Unhealthy
    } else if degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthReport {
        status,
        utilization_pct,
        avg_wait_time_ms,
        rss_bytes,
        failure_ratio,
        queue_backlog,
        reasons,
    }
}

/// Best-effort resident-set-size read for the current process, in bytes.
/// Returns 0 where `/proc/self/statm` isn't available (non-Linux); the
/// health check simply never trips the RSS threshold there.
pub fn current_rss_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(contents) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(pages) = contents.split_whitespace().nth(1) {
                if let Ok(pages) = pages.parse::<u64>() {
                    let page_size = 4096u64;
                    return pages * page_size;
                }
            }
        }
        0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}
