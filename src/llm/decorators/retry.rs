//! # LLM Retry Decorator
//!
//! Wraps any [`LLM`] so that failed provider invocations are retried with
//! exponential backoff before the error reaches the orchestrator.
//!
//! The decorator is transparent to serialization: it reports the inner
//! provider's type and identifying parameters, so wrapping an LLM does not
//! change its cache keys.
//!
//! ## Error Handling
//!
//! - **Rate limits (429)**: always retryable. A `retry_after` hint from the
//!   provider is slept before the next attempt, on top of the backoff delay.
//! - **Other errors**: retried unless the config has `only_retry_rate_limits`.
//! - **Exhaustion**: the last provider error is returned unchanged.

use crate::llm::config::RetryConfig;
use crate::llm::core::{CallOptions, LLM, LLMResult, ProviderError};
use crate::llm::retry::retry_if;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// A retry decorator around a shared LLM trait object.
///
/// # Example
///
/// ```rust,ignore
/// use forgechain::llm::{RetryConfig, RetryingLLM};
///
/// let llm = RetryingLLM::new(base_llm, RetryConfig::default().rate_limits_only());
/// ```
pub struct RetryingLLM {
    inner: Arc<dyn LLM>,
    config: RetryConfig,
}

impl RetryingLLM {
    /// Create a new RetryingLLM wrapper.
    pub fn new(inner: Arc<dyn LLM>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn should_retry(&self, error: &ProviderError) -> bool {
        !self.config.only_retry_rate_limits || error.is_rate_limited()
    }
}

#[async_trait]
impl LLM for RetryingLLM {
    fn llm_type(&self) -> &str {
        self.inner.llm_type()
    }

    fn identifying_params(&self) -> Map<String, Value> {
        self.inner.identifying_params()
    }

    async fn generate(
        &self,
        prompts: &[String],
        stop: Option<&[String]>,
        options: &CallOptions,
    ) -> Result<LLMResult, ProviderError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0usize;

        retry_if(
            &self.config,
            || {
                attempt += 1;
                let current = attempt;
                async move {
                    let error = match self.inner.generate(prompts, stop, options).await {
                        Ok(result) => return Ok(result),
                        Err(error) => error,
                    };
                    // Honour the provider's requested delay unless this was the last try.
                    if let Some(delay) = error.retry_after() {
                        if current < max_attempts && self.should_retry(&error) {
                            debug!(
                                attempt = current,
                                delay_ms = delay.as_millis() as u64,
                                "Waiting for provider retry hint"
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                    Err(error)
                }
            },
            |error: &ProviderError| self.should_retry(error),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Generation;
    use crate::llm::config::RetryStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockLLM {
        call_count: Arc<AtomicUsize>,
        error_on_call: Option<i64>,
        fail_first_n: Option<usize>,
    }

    impl MockLLM {
        fn new(call_count: Arc<AtomicUsize>) -> Self {
            Self {
                call_count,
                error_on_call: None,
                fail_first_n: None,
            }
        }

        fn with_error(mut self, error_code: i64) -> Self {
            self.error_on_call = Some(error_code);
            self
        }

        fn fail_first_n_calls(mut self, n: usize) -> Self {
            self.fail_first_n = Some(n);
            self
        }
    }

    #[async_trait]
    impl LLM for MockLLM {
        fn llm_type(&self) -> &str {
            "mock"
        }

        fn identifying_params(&self) -> Map<String, Value> {
            let mut params = Map::new();
            params.insert("model".to_string(), Value::from("mock-1"));
            params
        }

        async fn complete(
            &self,
            _prompt: &str,
            _stop: Option<&[String]>,
            _options: &CallOptions,
        ) -> Result<String, ProviderError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(fail_count) = self.fail_first_n {
                if count <= fail_count {
                    let error_json = serde_json::json!({
                        "error": {
                            "code": 429,
                            "message": "Rate limit exceeded",
                            "status": "RESOURCE_EXHAUSTED",
                            "details": [{
                                "@type": "type.googleapis.com/google.rpc.RetryInfo",
                                "retryDelay": "5ms"
                            }]
                        }
                    });
                    return Err(ProviderError::from_message(error_json.to_string()));
                }
                return Ok("Success after retries".to_string());
            }

            if let Some(error_code) = self.error_on_call {
                let error_json = serde_json::json!({
                    "error": {
                        "code": error_code,
                        "message": "An error occurred.",
                        "status": if error_code == 429 { "RESOURCE_EXHAUSTED" } else { "INTERNAL" }
                    }
                });
                Err(ProviderError::from_message(error_json.to_string()))
            } else {
                Ok("Success".to_string())
            }
        }
    }

    fn fast_config(max_attempts: usize) -> RetryConfig {
        RetryConfig::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
            RetryStrategy::ExponentialBackoff,
        )
    }

    async fn run(llm: &RetryingLLM) -> Result<LLMResult, ProviderError> {
        llm.generate(&["test".to_string()], None, &CallOptions::default())
            .await
    }

    #[tokio::test]
    async fn test_no_retry_on_success() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let llm = RetryingLLM::new(Arc::new(MockLLM::new(call_count.clone())), fast_config(4));

        let result = run(&llm).await.unwrap();

        assert_eq!(result.generations, vec![vec![Generation::new("Success")]]);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_on_429_until_exhausted() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock = MockLLM::new(call_count.clone()).with_error(429);
        let llm = RetryingLLM::new(Arc::new(mock), fast_config(4));

        let result = run(&llm).await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(call_count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_errors_retried_by_default() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock = MockLLM::new(call_count.clone()).with_error(500);
        let llm = RetryingLLM::new(Arc::new(mock), fast_config(3));

        let result = run(&llm).await;

        assert!(matches!(result, Err(ProviderError::Request(_))));
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_other_error_when_rate_limits_only() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock = MockLLM::new(call_count.clone()).with_error(500);
        let llm = RetryingLLM::new(Arc::new(mock), fast_config(3).rate_limits_only());

        let result = run(&llm).await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock = MockLLM::new(call_count.clone()).fail_first_n_calls(2);
        let llm = RetryingLLM::new(Arc::new(mock), fast_config(4));

        let result = run(&llm).await.unwrap();

        assert_eq!(result.generations[0][0].text, "Success after retries");
        assert_eq!(call_count.load(Ordering::SeqCst), 3); // 2 failed + 1 success
    }

    #[test]
    fn test_decorator_is_transparent_to_identity() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let llm = RetryingLLM::new(Arc::new(MockLLM::new(call_count)), fast_config(2));

        assert_eq!(llm.llm_type(), "mock");
        assert_eq!(llm.identifying_params()["model"], "mock-1");
    }
}
