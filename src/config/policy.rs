use crate::wire::protocol::EXCHANGE_DEADLINE;

use rand::Rng;
use std::time::Duration;

/// Interval between background resynchronization attempts.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Backoff schedule for retrying a failed operation in the background.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the computed delay (before jitter).
    pub max_delay: Duration,
    /// Growth factor per attempt; `1` keeps a fixed interval.
    pub multiplier: u32,
    /// Random extra delay added to every wait.
    pub max_jitter: Duration,
    /// Total number of retries; `None` retries until success.
    pub max_attempts: Option<usize>,
}

impl RetryPolicy {
    /// Fixed 60 s interval with a little jitter, giving up after one day.
    pub fn resync() -> Self {
        Self {
            initial_delay: RESYNC_INTERVAL,
            max_delay: RESYNC_INTERVAL,
            multiplier: 1,
            max_jitter: Duration::from_secs(1),
            max_attempts: Some(24 * 60),
        }
    }

    /// Doubling delay starting at `initial_delay`, capped at `max_delay`.
    pub fn exponential(initial_delay: Duration, max_delay: Duration, max_attempts: usize) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2,
            max_jitter: Duration::from_millis(50),
            max_attempts: Some(max_attempts),
        }
    }

    /// Whether retry number `attempt` (0-based) may run.
    pub fn allows(&self, attempt: usize) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Delay before retry number `attempt` (0-based), jitter included.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        let base = self
            .initial_delay
            .saturating_mul(factor)
            .min(self.max_delay.max(self.initial_delay));

        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        base + jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::resync()
    }
}

/// Failover budget for one batch of a recommendation request.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Connection attempts per batch, first attempt included.
    pub max_attempts: usize,
    /// Deadline for one full batch exchange.
    pub exchange_deadline: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            exchange_deadline: EXCHANGE_DEADLINE,
        }
    }
}
