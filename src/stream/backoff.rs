//! Exponential backoff for event stream reconnection

use std::time::Duration;

use rand::Rng;

use crate::config::StreamConfig;

/// Reconnect backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnect, in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Additive jitter is drawn from `0..max_jitter_ms`
    pub max_jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000, // 30 seconds
            multiplier: 2.0,
            max_jitter_ms: 1_000,
        }
    }
}

impl From<&StreamConfig> for BackoffConfig {
    fn from(config: &StreamConfig) -> Self {
        Self {
            initial_delay_ms: config.reconnect_base_delay_ms,
            max_delay_ms: config.reconnect_max_delay_ms,
            multiplier: 2.0,
            max_jitter_ms: config.reconnect_jitter_ms,
        }
    }
}

/// Computes `min(initial * multiplier^(attempt-1) + jitter, max)`
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.config.initial_delay_ms as f64 * self.config.multiplier.powi(exponent);

        let jitter = if self.config.max_jitter_ms > 0 {
            rand::rng().random_range(0..self.config.max_jitter_ms) as f64
        } else {
            0.0
        };

        let capped = (base + jitter).min(self.config.max_delay_ms as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Replace the base delay, e.g. when the server sends a `retry:` field
    pub fn set_initial_delay(&mut self, initial_delay_ms: u64) {
        self.config.initial_delay_ms = initial_delay_ms;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_delay_ms: u64, max_delay_ms: u64) -> ReconnectBackoff {
        ReconnectBackoff::with_config(BackoffConfig {
            initial_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
            max_jitter_ms: 0,
        })
    }

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let backoff = no_jitter(1_000, 30_000);

        assert_eq!(backoff.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(4_000));
        assert_eq!(backoff.delay_for(5), Duration::from_millis(16_000));
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let backoff = ReconnectBackoff::new();

        for attempt in 1..=64 {
            assert!(backoff.delay_for(attempt) <= Duration::from_millis(30_000));
        }
        assert_eq!(backoff.delay_for(10), Duration::from_millis(30_000));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let backoff = ReconnectBackoff::new();

        for _ in 0..200 {
            let delay = backoff.delay_for(1).as_millis();
            assert!((1_000..2_000).contains(&delay));
        }
    }

    #[test]
    fn test_delay_non_decreasing_in_expectation() {
        let backoff = ReconnectBackoff::new();
        let mean = |attempt: u32| -> u128 {
            (0..100).map(|_| backoff.delay_for(attempt).as_millis()).sum::<u128>() / 100
        };

        let mut previous = 0;
        for attempt in 1..=8 {
            let current = mean(attempt);
            assert!(current >= previous, "attempt {attempt}: {current} < {previous}");
            previous = current;
        }
    }

    #[test]
    fn test_server_retry_overrides_base() {
        let mut backoff = no_jitter(1_000, 30_000);
        backoff.set_initial_delay(250);
        assert_eq!(backoff.delay_for(1), Duration::from_millis(250));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(1_000));
    }
}
