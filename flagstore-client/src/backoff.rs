//! Reconnect backoff.

use std::time::Duration;

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    /// Exponential backoff doubling from `initial` up to `max`, with jitter.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max,
            jitter: true,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let base_millis = (self.initial.as_millis() as f64 * factor) as u64;
        let millis = if self.jitter {
            // Add jitter: 0-50% of the delay
            base_millis + (base_millis as f64 * rand::random::<f64>() * 0.5) as u64
        } else {
            base_millis
        };
        Duration::from_millis(millis).min(self.max)
    }
}
