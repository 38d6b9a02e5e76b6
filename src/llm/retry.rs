//! Generic retry with exponential backoff for any outbound provider call.
//!
//! The helpers here know nothing about LLMs: they take a zero-argument action
//! producing a future and re-run it on failure following a [`RetryConfig`].
//! When attempts are exhausted the last error is returned unchanged.
//!
//! ```rust,ignore
//! use forgechain::llm::{retry, RetryConfig};
//!
//! let embedding = retry(&RetryConfig::default(), || client.embed(&text)).await?;
//! ```

use crate::llm::config::{RetryConfig, RetryStrategy};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::jitter;
use tracing::{debug, warn};

/// The delays slept between attempts, one per retry.
///
/// Yields `max_attempts - 1` values. Exponential strategies double from
/// `min_delay` and are capped at `max_delay`; jittered delays are randomised
/// within `[min_delay, capped delay]`.
pub fn backoff_delays(config: &RetryConfig) -> impl Iterator<Item = Duration> {
    let retries = config.max_attempts.saturating_sub(1);
    let min_delay = config.min_delay;
    let max_delay = config.max_delay.max(min_delay);
    let strategy = config.strategy;

    (0..retries).map(move |retry| {
        let delay = match strategy {
            RetryStrategy::Fixed => min_delay,
            RetryStrategy::ExponentialBackoff | RetryStrategy::ExponentialBackoffWithJitter => {
                let factor = 2u32.saturating_pow(retry.min(u32::MAX as usize) as u32);
                min_delay.saturating_mul(factor).min(max_delay)
            }
        };
        if strategy == RetryStrategy::ExponentialBackoffWithJitter {
            jitter(delay).max(min_delay)
        } else {
            delay
        }
    })
}

/// Invokes `action` until it succeeds or the attempts in `config` run out.
///
/// Every error is considered retryable.
pub async fn retry<A, F, T, E>(config: &RetryConfig, action: A) -> Result<T, E>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(config, action, |_: &E| true).await
}

/// Invokes `action` until it succeeds, `condition` rejects an error, or the
/// attempts in `config` run out.
pub async fn retry_if<A, F, T, E, C>(config: &RetryConfig, action: A, mut condition: C) -> Result<T, E>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, E>>,
    E: Display,
    C: FnMut(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0usize;

    RetryIf::spawn(backoff_delays(config), action, |error: &E| {
        attempt += 1;
        let retryable = condition(error);
        if retryable && attempt < max_attempts {
            warn!(attempt, max_attempts, error = %error, "Attempt failed, retrying");
        } else {
            debug!(attempt, retryable, error = %error, "Giving up");
        }
        retryable
    })
    .await
}
