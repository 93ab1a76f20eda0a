//! Retry delays for failed rate refreshes.

use std::time::Duration;

/// Delay strategy between refresh retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * 2^(attempt - 1)`, never longer than `max`.
    Exponential { base: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt`, counting from 1.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(31);
                base.saturating_mul(1u32 << exponent).min(max)
            }
        }
    }
}

/// How many times a failed refresh is retried, and how far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn exponential(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential { base, max },
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry `attempt`, or `None` once retries are exhausted.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        (attempt >= 1 && attempt <= self.max_retries).then(|| self.backoff.delay(attempt))
    }
}
