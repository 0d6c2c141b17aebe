// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Named priority levels.
//!
//! Arbitrary signed integers are accepted everywhere a priority is taken;
//! these constants are just convenient, well-known points on that scale
//! (used by the CLI's `priority set <id> CRITICAL|HIGH|NORMAL|LOW|BATCH`
//! subcommand and by callers who want a readable default).

use std::fmt;
use std::str::FromStr;

/// A named priority level, convertible to/from the raw `i64` the scheduler
/// actually orders on.
///
/// Ordering follows [`Priority::value`], not declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Batch,
    Custom(i64),
}

impl Priority {
    pub const CRITICAL: i64 = 1000;
    pub const HIGH: i64 = 100;
    pub const NORMAL: i64 = 0;
    pub const LOW: i64 = -100;
    pub const BATCH: i64 = -1000;

    /// The raw integer value the scheduler orders on.
    pub fn value(self) -> i64 {
        match self {
            Priority::Critical => Self::CRITICAL,
            Priority::High => Self::HIGH,
            Priority::Normal => Self::NORMAL,
            Priority::Low => Self::LOW,
            Priority::Batch => Self::BATCH,
            Priority::Custom(v) => v,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value().cmp(&other.value())
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl From<i64> for Priority {
    fn from(v: i64) -> Self {
        match v {
            Self::CRITICAL => Priority::Critical,
            Self::HIGH => Priority::High,
            Self::NORMAL => Priority::Normal,
            Self::LOW => Priority::Low,
            Self::BATCH => Priority::Batch,
            other => Priority::Custom(other),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "CRITICAL"),
            Priority::High => write!(f, "HIGH"),
            Priority::Normal => write!(f, "NORMAL"),
            Priority::Low => write!(f, "LOW"),
            Priority::Batch => write!(f, "BATCH"),
            Priority::Custom(v) => write!(f, "{v}"),
        }
    }
}

/// Error returned when a priority string is neither a named level nor a
/// parseable integer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid priority {0:?}: expected CRITICAL, HIGH, NORMAL, LOW, BATCH, or an integer")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Priority::Critical),
            "HIGH" => Ok(Priority::High),
            "NORMAL" => Ok(Priority::Normal),
            "LOW" => Ok(Priority::Low),
            "BATCH" => Ok(Priority::Batch),
            _ => s
                .parse::<i64>()
                .map(Priority::from)
                .map_err(|_| ParsePriorityError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_levels_round_trip_through_value() {
        for p in [
            Priority::Critical,
            Priority::High,
            Priority::Normal,
            Priority::Low,
            Priority::Batch,
        ] {
            assert_eq!(Priority::from(p.value()), p);
        }
    }

    #[test]
    fn parses_named_levels_case_insensitively() {
        assert_eq!("critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert_eq!("High".parse::<Priority>().unwrap(), Priority::High);
    }

    #[test]
    fn parses_arbitrary_integers() {
        assert_eq!("42".parse::<Priority>().unwrap(), Priority::Custom(42));
        assert_eq!("-7".parse::<Priority>().unwrap(), Priority::Custom(-7));
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-priority".parse::<Priority>().is_err());
    }

    #[test]
    fn ordering_matches_value_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert!(Priority::Low > Priority::Batch);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_i64_round_trips_through_from_and_value(v: i64) {
            prop_assert_eq!(Priority::from(v).value(), v);
        }

        #[test]
        fn display_of_any_priority_parses_back_to_same_value(v: i64) {
            let p = Priority::from(v);
            let parsed: Priority = p.to_string().parse().expect("Display output must parse");
            prop_assert_eq!(parsed.value(), p.value());
        }

        #[test]
        fn parsing_never_panics(s in "\\PC{0,32}") {
            let _ = s.parse::<Priority>();
        }
    }
}
