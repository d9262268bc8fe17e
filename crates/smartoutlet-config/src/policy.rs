//! Bounded retry and timeout budgets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed-count retry schedule with a constant pause between attempts.
///
/// The default (500 attempts, 10 ms apart) gives roughly five seconds, enough
/// for a daemon that is exiting after a version mismatch to release its port.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Number of attempts before giving up.
    pub attempts: u32,
    /// Pause between attempts in milliseconds.
    pub interval_ms: u64,
}

impl RetryPolicy {
    /// Builds a retry policy.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on the time the schedule can take.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval().saturating_mul(self.attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 500,
            interval_ms: 10,
        }
    }
}

/// Timeout and retry budget for a single device exchange.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkPolicy {
    /// Per-exchange timeout in milliseconds.
    pub timeout_ms: u64,
    /// Extra attempts after the first one times out.
    pub retries: u32,
}

impl NetworkPolicy {
    /// Per-exchange timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            retries: 0,
        }
    }
}
