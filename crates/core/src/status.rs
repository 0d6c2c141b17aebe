// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Task status lattice.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a [`crate::Task`].
///
/// Transitions are monotonic: `Queued -> Running -> {Exited, Killed,
/// Timeout}` or `Queued -> StartFailed` or `-> {Running, StartFailed}`
/// directly on the direct admission path. Once a task reaches a terminal
/// status it is frozen for the rest of its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Admitted, waiting in the priority queue for a dispatch slot.
    Queued,
    /// Spawned and alive.
    Running,
    /// Process exited on its own; see `Task::exit_code`.
    Exited,
    /// Terminated by an explicit kill (or idle-watchdog escalation path
    /// that chose to label it killed rather than timeout).
    Killed,
    /// Terminated by the idle watchdog after exceeding its idle timeout.
    Timeout,
    /// Never successfully spawned (exec failure, or cancelled while
    /// queued). See `Task::start_error`.
    StartFailed,
}

impl TaskStatus {
    /// Terminal statuses are frozen: no further transition is legal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Exited | TaskStatus::Killed | TaskStatus::Timeout | TaskStatus::StartFailed
        )
    }

    pub fn is_queued(self) -> bool {
        matches!(self, TaskStatus::Queued)
    }

    pub fn is_running(self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    /// Whether `to` is a legal transition from `self` under the status
    /// lattice above. Used defensively by the registry; violations are bugs.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (Queued, Running) => true,
            (Queued, StartFailed) => true,
            (Running, Exited) => true,
            (Running, Killed) => true,
            (Running, Timeout) => true,
            (Running, StartFailed) => true, // synchronous spawn failure on the direct path
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Exited => "exited",
            TaskStatus::Killed => "killed",
            TaskStatus::Timeout => "timeout",
            TaskStatus::StartFailed => "start-failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Exited.is_terminal());
        assert!(TaskStatus::Killed.is_terminal());
        assert!(TaskStatus::Timeout.is_terminal());
        assert!(TaskStatus::StartFailed.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn legal_transitions() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::StartFailed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Exited));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Killed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Timeout));
    }

    #[test]
    fn terminal_statuses_never_transition() {
        for terminal in [
            TaskStatus::Exited,
            TaskStatus::Killed,
            TaskStatus::Timeout,
            TaskStatus::StartFailed,
        ] {
            for to in [TaskStatus::Queued, TaskStatus::Running, TaskStatus::Exited] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn no_illegal_back_edges() {
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Queued));
    }

    #[test]
    fn display_matches_status_machine_labels() {
        assert_eq!(TaskStatus::StartFailed.to_string(), "start-failed");
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }
}
