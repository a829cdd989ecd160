//! Exponential backoff with jitter, shared by publishing and the intake server.

use crate::config::PublishConfig;
use std::time::Duration;

/// Delays never drop below this unless the base delay itself is smaller.
const MIN_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_ms: u64,
    pub jitter_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    /// Total attempts, including the first.
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn from_publish(config: &PublishConfig) -> Self {
        Self {
            initial_ms: config.retry_initial_ms,
            jitter_ms: config.retry_jitter_ms,
            max_ms: config.retry_max_ms,
            multiplier: config.retry_multiplier,
            attempts: config.retry_attempts.max(1),
        }
    }

    /// Next base delay after `current_ms`, capped at the maximum.
    pub fn backoff(&self, current_ms: u64) -> u64 {
        ((current_ms as f64 * self.multiplier) as u64).min(self.max_ms)
    }
}

/// Compute jittered delay for retry.
/// Uses system time nanoseconds for simple jitter without requiring rand crate.
pub fn compute_jittered_delay(base_ms: u64, jitter_ms: u64) -> Duration {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    // Map nanos to range [-jitter_ms, +jitter_ms]
    let jitter_range = (jitter_ms * 2) as i64;
    let jitter = if jitter_range > 0 {
        (nanos as i64 % jitter_range) - (jitter_ms as i64)
    } else {
        0
    };

    let floor = MIN_DELAY_MS.min(base_ms) as i64;
    let delay_ms = (base_ms as i64 + jitter).max(floor) as u64;
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_in_range() {
        for _ in 0..50 {
            let delay = compute_jittered_delay(5_000, 500).as_millis() as u64;
            assert!((4_500..=5_500).contains(&delay));
        }
    }

    #[test]
    fn test_floor_applies() {
        assert!(compute_jittered_delay(1_200, 1_000).as_millis() >= 1_000);
        assert_eq!(compute_jittered_delay(0, 0), Duration::ZERO);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let policy = RetryPolicy::from_publish(&PublishConfig::default());
        assert_eq!(policy.backoff(2_000), 4_000);
        assert_eq!(policy.backoff(50_000), 60_000);
        assert_eq!(policy.attempts, 3);
    }
}
