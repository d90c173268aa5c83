//! Types for the polling waiter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// Not there yet; poll again after one interval.
    Pending,
    /// Condition met.
    Confirmed(T),
    /// Condition can never be met; stop without retrying.
    PermanentFailure(String),
}

/// Why a wait ended without confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("{0}")]
    Failed(String),

    #[error("not confirmed after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("service unreachable after {errors} consecutive errors: {last_error}")]
    Unreachable { errors: u32, last_error: String },

    #[error("Cancelled")]
    Cancelled,
}

/// Timing for one waiter call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay between polls (milliseconds).
    pub interval_ms: u64,
    /// Cap on pending outcomes and on consecutive poll errors.
    pub max_attempts: u32,
}

impl PollSettings {
    pub const fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_error_display() {
        assert_eq!(WaitError::Cancelled.to_string(), "Cancelled");
        assert_eq!(
            WaitError::TimedOut { attempts: 100 }.to_string(),
            "not confirmed after 100 attempts"
        );
        assert_eq!(
            WaitError::Unreachable {
                errors: 3,
                last_error: "connection refused".to_string()
            }
            .to_string(),
            "service unreachable after 3 consecutive errors: connection refused"
        );
    }

    #[test]
    fn test_settings_interval() {
        let settings = PollSettings::new(20_000, 100);
        assert_eq!(settings.interval(), Duration::from_secs(20));
    }
}
