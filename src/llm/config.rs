use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retrying outbound provider calls.
///
/// `max_attempts` counts every invocation including the first one, so a value
/// of 1 means "call once, never retry". Delays start at `min_delay` and never
/// exceed `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (values below 1 are treated as 1)
    pub max_attempts: usize,
    /// Delay before the first retry
    pub min_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// The backoff curve to use
    pub strategy: RetryStrategy,
    /// Whether to only retry on rate limit (429) errors
    pub only_retry_rate_limits: bool,
}

/// Retry strategy for handling failed provider requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// `min_delay` between every attempt
    Fixed,
    /// Doubling delays without jitter
    ExponentialBackoff,
    /// Doubling delays with random jitter, never below `min_delay`
    ExponentialBackoffWithJitter,
}

impl Default for RetryConfig {
    /// Default retry configuration for provider calls.
    ///
    /// - 6 attempts in total
    /// - 500ms first delay, 10s ceiling
    /// - Exponential backoff with jitter
    /// - Every error is retried
    fn default() -> Self {
        Self {
            max_attempts: 6,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            strategy: RetryStrategy::ExponentialBackoffWithJitter,
            only_retry_rate_limits: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom parameters.
    pub fn new(
        max_attempts: usize,
        min_delay: Duration,
        max_delay: Duration,
        strategy: RetryStrategy,
    ) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay,
            strategy,
            only_retry_rate_limits: false,
        }
    }

    /// Restrict retries to rate limit errors; everything else fails immediately.
    pub fn rate_limits_only(mut self) -> Self {
        self.only_retry_rate_limits = true;
        self
    }

    /// More attempts with shorter delays.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 8,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            strategy: RetryStrategy::ExponentialBackoffWithJitter,
            only_retry_rate_limits: false,
        }
    }

    /// Fewer attempts with longer delays.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            strategy: RetryStrategy::ExponentialBackoff,
            only_retry_rate_limits: true,
        }
    }

    /// A single attempt, no retry.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            strategy: RetryStrategy::Fixed,
            only_retry_rate_limits: false,
        }
    }

    /// Whether this configuration allows more than one attempt.
    pub fn retries_enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.min_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.strategy, RetryStrategy::ExponentialBackoffWithJitter);
        assert!(!config.only_retry_rate_limits);
        assert!(config.retries_enabled());
    }

    #[test]
    fn test_disabled_config() {
        let config = RetryConfig::disabled();
        assert_eq!(config.max_attempts, 1);
        assert!(!config.retries_enabled());
    }

    #[test]
    fn test_conservative_config() {
        let config = RetryConfig::conservative();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.min_delay, Duration::from_secs(2));
        assert!(config.only_retry_rate_limits);
    }

    #[test]
    fn test_rate_limits_only() {
        let config = RetryConfig::aggressive().rate_limits_only();
        assert!(config.only_retry_rate_limits);
        assert_eq!(config.max_attempts, 8);
    }
}
