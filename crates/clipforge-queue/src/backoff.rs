//! Retry backoff with exponential growth and jitter.

use std::time::Duration;

use rand::Rng;

/// Cap on any single retry delay.
const MAX_DELAY: Duration = Duration::from_secs(900);

/// Exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay before the first retry
    pub base: Duration,
    /// Growth factor per completed attempt
    pub factor: f64,
    /// Jitter fraction, e.g. 0.25 for ±25%
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            factor: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Deterministic delay before retrying after `attempts` completed
    /// attempts (so the first retry uses the base delay).
    pub fn raw_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let secs = self.base.as_secs_f64() * self.factor.powi(exponent as i32);
        Duration::from_secs_f64(secs.min(MAX_DELAY.as_secs_f64()))
    }

    /// Delay with jitter applied: `raw * (1 ± jitter)`.
    pub fn delay(&self, attempts: u32) -> Duration {
        let raw = self.raw_delay(attempts).as_secs_f64();
        let spread = raw * self.jitter;
        let jittered = if spread > 0.0 {
            rand::thread_rng().gen_range((raw - spread)..=(raw + spread))
        } else {
            raw
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}
