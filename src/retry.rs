//! Retry policy for the completion loop
//!
//! The remote service regularly answers with empty or mis-shaped content.
//! The client asks again after a delay until it gets something usable or
//! the attempt bound is reached.

use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (first call included); `None` retries forever
    pub max_attempts: Option<usize>,
    /// Delay before the first retry
    pub delay: Duration,
    /// Multiplier applied per retry (1.0 keeps the delay fixed)
    pub backoff_multiplier: f64,
    /// Upper bound for the delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(20),
            delay: Duration::from_secs(5),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts
    pub fn fixed(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            max_attempts,
            delay,
            ..Default::default()
        }
    }

    /// Retry forever with the given delay
    pub fn unbounded(delay: Duration) -> Self {
        Self::fixed(delay, None)
    }

    /// No delay, for tests and local mocks
    pub fn immediate(max_attempts: usize) -> Self {
        Self::fixed(Duration::ZERO, Some(max_attempts))
    }

    pub fn with_backoff(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_delay = max_delay;
        self
    }

    /// Whether another attempt may follow `attempts_made`
    pub fn should_retry(&self, attempts_made: usize) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        if self.backoff_multiplier <= 1.0 {
            return self.delay;
        }
        let exponent = retry.min(i32::MAX as usize) as i32;
        let base = self.delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}
