//! Bounded exponential back-off for transport retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RetryPolicy;

/// How many times a single send is attempted, and how long to wait between
/// attempts.
///
/// The delay before attempt `n + 1` is
/// `initial_backoff * multiplier^(n - 1)`, capped at `max_backoff`. A
/// transport-supplied [`RetryPolicy::Retryable`] `after` hint wins when it is
/// longer than the computed delay, but is capped at `max_backoff` too: a
/// worker never sleeps longer than that between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySchedule {
    /// Total attempts including the first. Always at least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetrySchedule {
    /// Four attempts, waiting 1 s, 2 s, then 4 s between them.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
    pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

    /// Schedule that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns `true` if another attempt is allowed after `attempts_made`.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32, policy: &RetryPolicy) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let computed = self
            .initial_backoff
            .mul_f64(factor.min(f64::from(u32::MAX)))
            .min(self.max_backoff);

        match policy {
            RetryPolicy::Retryable { after: Some(hint) } if *hint > computed => {
                (*hint).min(self.max_backoff)
            }
            _ => computed,
        }
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Self::DEFAULT_INITIAL_BACKOFF,
            multiplier: Self::DEFAULT_MULTIPLIER,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
        }
    }
}
