//! Exponential backoff schedule for transient fetch failures.

use std::time::Duration;

/// Backoff schedule: the delay before attempt `n + 1` is `delays[n]`.
/// The number of attempts is `delays.len() + 1`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    /// Three attempts total, delays of 1s, 2s (a 4s delay would only
    /// precede a fourth attempt and is never slept).
    fn default() -> Self {
        Self {
            delays: vec![Duration::from_secs(1), Duration::from_secs(2)],
        }
    }
}

impl RetryPolicy {
    /// A custom schedule. `delays` may be empty for a single-attempt policy.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// No retries and no sleeping; used by tests.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Delay to sleep after failed attempt `attempt` (0-based), if any
    /// attempt remains.
    pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }
}
