// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Priority-ordered waiting list.
//!
//! Ordered by `(effective_priority DESC, insertion_seq ASC)`. Effective
//! priority is computed once at enqueue time and cached; `recompute_aging`
//! lets the scheduler refresh it (and re-sort) on a dispatch tick.

use std::collections::HashMap;
use taskyard_core::task::AgingConfig;
use taskyard_core::TaskId;

/// One waiting entry. `queue_id` is the lookup key used by
/// `reprioritizeTask`/`cancelTask`, kept typed rather than smuggled through
/// `Task::metadata`.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub queue_id: String,
    pub base_priority: i64,
    pub aging: AgingConfig,
    pub queued_at_ms: u64,
    pub insertion_seq: u64,
    effective_priority: i64,
}

impl QueueEntry {
    pub fn effective_priority(&self) -> i64 {
        self.effective_priority
    }
}

fn effective_priority(base: i64, aging: &AgingConfig, queued_at_ms: u64, now_ms: u64) -> i64 {
    if !aging.enabled {
        return base;
    }
    let age_minutes = now_ms.saturating_sub(queued_at_ms) as f64 / 60_000.0;
    let bonus = (age_minutes * aging.increment_per_minute).floor() as i64;
    base.saturating_add(bonus).min(aging.max_priority)
}

/// A priority-ordered waiting structure, indexable by queue id.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    /// Kept sorted: highest effective priority first, ties broken by
    /// ascending insertion_seq (FIFO within a priority).
    entries: Vec<QueueEntry>,
    index: HashMap<String, usize>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn sort_key(entry: &QueueEntry) -> (std::cmp::Reverse<i64>, u64) {
        (std::cmp::Reverse(entry.effective_priority), entry.insertion_seq)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, e) in self.entries.iter().enumerate() {
            self.index.insert(e.queue_id.clone(), i);
        }
    }

    fn resort(&mut self) {
        self.entries.sort_by_key(Self::sort_key);
        self.reindex();
    }

    /// Insert maintaining `(priority DESC, insertion_seq ASC)` ordering.
    pub fn enqueue(
        &mut self,
        task_id: TaskId,
        queue_id: impl Into<String>,
        base_priority: i64,
        aging: AgingConfig,
        queued_at_ms: u64,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let effective = effective_priority(base_priority, &aging, queued_at_ms, queued_at_ms);
        let entry = QueueEntry {
            task_id,
            queue_id: queue_id.into(),
            base_priority,
            aging,
            queued_at_ms,
            insertion_seq: seq,
            effective_priority: effective,
        };
        self.entries.push(entry);
        self.resort();
        seq
    }

    /// Remove & return the head (highest effective priority, earliest
    /// insertion on ties).
    pub fn pop(&mut self) -> Option<QueueEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        self.reindex();
        Some(entry)
    }

    /// Remove by queue-id; returns whether an entry was removed.
    pub fn remove(&mut self, queue_id: &str) -> bool {
        if let Some(&i) = self.index.get(queue_id) {
            self.entries.remove(i);
            self.reindex();
            true
        } else {
            false
        }
    }

    /// Remove + re-insert with a new base priority; returns success.
    pub fn set_priority(&mut self, queue_id: &str, new_priority: i64) -> bool {
        if let Some(&i) = self.index.get(queue_id) {
            self.entries[i].base_priority = new_priority;
            self.entries[i].effective_priority = effective_priority(
                new_priority,
                &self.entries[i].aging,
                self.entries[i].queued_at_ms,
                self.entries[i].queued_at_ms,
            );
            self.resort();
            true
        } else {
            false
        }
    }

    /// Recompute aging bonuses against `now_ms` and re-sort. Safe to call
    /// on every dispatch tick; a no-op for entries with aging disabled.
    pub fn recompute_aging(&mut self, now_ms: u64) {
        let mut changed = false;
        for e in &mut self.entries {
            if !e.aging.enabled {
                continue;
            }
            let new_eff = effective_priority(e.base_priority, &e.aging, e.queued_at_ms, now_ms);
            if new_eff != e.effective_priority {
                e.effective_priority = new_eff;
                changed = true;
            }
        }
        if changed {
            self.resort();
        }
    }

    /// Read-only view sorted by current effective priority, highest first.
    pub fn snapshot(&self) -> Vec<&QueueEntry> {
        self.entries.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, queue_id: &str) -> bool {
        self.index.contains_key(queue_id)
    }

    /// Drop all waiting entries. Returns the removed entries so the caller
    /// can decide what happens to their owning tasks.
    pub fn clear(&mut self) -> Vec<QueueEntry> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noage() -> AgingConfig {
        AgingConfig::default()
    }

    #[test]
    fn fifo_within_equal_priority() {
        let mut q = PriorityQueue::new();
        q.enqueue(TaskId::new("a"), "a", 0, noage(), 0);
        q.enqueue(TaskId::new("b"), "b", 0, noage(), 0);
        assert_eq!(q.pop().unwrap().queue_id, "a");
        assert_eq!(q.pop().unwrap().queue_id, "b");
    }

    #[test]
    fn higher_priority_leaves_first() {
        let mut q = PriorityQueue::new();
        q.enqueue(TaskId::new("low"), "low", 0, noage(), 0);
        q.enqueue(TaskId::new("high"), "high", 100, noage(), 0);
        q.enqueue(TaskId::new("crit"), "crit", 1000, noage(), 0);
        assert_eq!(q.pop().unwrap().queue_id, "crit");
        assert_eq!(q.pop().unwrap().queue_id, "high");
        assert_eq!(q.pop().unwrap().queue_id, "low");
    }

    #[test]
    fn set_priority_reorders() {
        let mut q = PriorityQueue::new();
        q.enqueue(TaskId::new("a"), "a", 0, noage(), 0);
        q.enqueue(TaskId::new("b"), "b", 0, noage(), 0);
        assert!(q.set_priority("a", 10));
        assert_eq!(q.pop().unwrap().queue_id, "a");
        assert_eq!(q.pop().unwrap().queue_id, "b");
    }

    #[test]
    fn set_priority_on_unknown_id_fails() {
        let mut q = PriorityQueue::new();
        assert!(!q.set_priority("missing", 10));
    }

    #[test]
    fn remove_drops_entry() {
        let mut q = PriorityQueue::new();
        q.enqueue(TaskId::new("a"), "a", 0, noage(), 0);
        assert!(q.remove("a"));
        assert!(q.is_empty());
        assert!(!q.remove("a"));
    }

    #[test]
    fn aging_bonus_clamped_to_max_priority() {
        let mut q = PriorityQueue::new();
        let aging = AgingConfig {
            enabled: true,
            increment_per_minute: 1000.0,
            max_priority: 50,
        };
        q.enqueue(TaskId::new("a"), "a", 0, aging, 0);
        q.recompute_aging(60_000 * 10); // 10 minutes elapsed
        assert_eq!(q.snapshot()[0].effective_priority(), 50);
    }

    #[test]
    fn clear_empties_queue_and_returns_entries() {
        let mut q = PriorityQueue::new();
        q.enqueue(TaskId::new("a"), "a", 0, noage(), 0);
        q.enqueue(TaskId::new("b"), "b", 0, noage(), 0);
        let dropped = q.clear();
        assert_eq!(dropped.len(), 2);
        assert!(q.is_empty());
    }
}
