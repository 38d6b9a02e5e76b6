use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// A JSON object describing an LLM: its identifying parameters plus a `_type`
/// discriminator naming the provider.
pub type SerializedLLM = Map<String, Value>;

/// Key under which the provider discriminator is stored in a [`SerializedLLM`].
pub const TYPE_KEY: &str = "_type";

/// Errors raised by a provider while serving a request.
///
/// The orchestrator never recovers from these; it reports them to the
/// callbacks and hands them back to the caller untouched inside
/// [`LLMError::Provider`].
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider refused the request because of rate limiting.
    ///
    /// `retry_after` carries the delay the provider asked for, when it sent one.
    #[error("rate limited by provider: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    /// The request failed for any other reason reported by the provider.
    #[error("provider request failed: {0}")]
    Request(String),
    /// The request did not complete within the caller's timeout.
    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),
    /// An error from a provider client library, passed through as-is.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Classifies a provider error message.
    ///
    /// Provider SDKs usually surface the HTTP error body inside their error
    /// string. When that body is a JSON error object with code 429 the error is
    /// a rate limit, and a Google `RetryInfo` detail, if present, provides the
    /// delay the provider requested.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let Some(body) = message.find('{').map(|start| &message[start..]) else {
            return ProviderError::Request(message);
        };
        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return ProviderError::Request(message);
        };
        if json["error"]["code"].as_i64() != Some(429) {
            return ProviderError::Request(message);
        }

        let retry_after = json["error"]["details"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|detail| {
                detail["@type"].as_str() == Some("type.googleapis.com/google.rpc.RetryInfo")
            })
            .find_map(|detail| detail["retryDelay"].as_str())
            .and_then(|delay| humantime::parse_duration(delay).ok());

        ProviderError::RateLimited {
            message,
            retry_after,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// The delay the provider asked callers to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Errors surfaced by the LLM and chat orchestrators.
#[derive(Error, Debug)]
pub enum LLMError {
    /// The call input was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Caching was requested without a backend, or options conflict.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A serialized configuration named a provider type nobody registered.
    #[error("cannot load LLM with type {0}")]
    UnknownProviderType(String),
    /// The provider call failed. The inner error is exactly what the provider returned.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The provider returned a different number of generation lists than prompts.
    #[error("provider returned {actual} generation lists for {expected} prompts")]
    GenerationCountMismatch { expected: usize, actual: usize },
    /// The provider returned no generation where one was required.
    #[error("provider returned no generations")]
    EmptyGeneration,
}

/// One produced text plus optional provider-specific metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Raw generation info from the provider, e.g. the finish reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<Map<String, Value>>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation_info: None,
        }
    }

    pub fn with_info(mut self, info: Map<String, Value>) -> Self {
        self.generation_info = Some(info);
        self
    }
}

/// The result of one `generate` call: a list of generations per prompt, in
/// prompt order, plus optional provider-level output such as token usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMResult {
    pub generations: Vec<Vec<Generation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<Map<String, Value>>,
}

/// Per-request options handed through to the provider.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Upper bound on a single provider invocation.
    pub timeout: Option<Duration>,
    /// Extra provider-specific request parameters.
    pub extra: Map<String, Value>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A trait that defines the contract for any LLM provider the orchestrator can drive.
///
/// Providers implement either [`LLM::generate`], when their API accepts a batch
/// of prompts, or the simpler single-prompt [`LLM::complete`], in which case the
/// default `generate` runs the prompts one after another.
///
/// # Examples
///
/// ```rust
/// use forgechain::llm::{CallOptions, LLM, ProviderError};
/// use async_trait::async_trait;
///
/// struct EchoLLM;
///
/// #[async_trait]
/// impl LLM for EchoLLM {
///     fn llm_type(&self) -> &str {
///         "echo"
///     }
///
///     async fn complete(
///         &self,
///         prompt: &str,
///         _stop: Option<&[String]>,
///         _options: &CallOptions,
///     ) -> Result<String, ProviderError> {
///         Ok(format!("echo: {}", prompt))
///     }
/// }
/// ```
#[async_trait]
pub trait LLM: Send + Sync {
    /// The discriminator identifying this provider type in serialized form.
    fn llm_type(&self) -> &str;

    /// Parameters that identify this model configuration.
    ///
    /// They are part of every cache key, so two instances with equal
    /// parameters share cached generations.
    fn identifying_params(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Runs the model on a single prompt.
    async fn complete(
        &self,
        _prompt: &str,
        _stop: Option<&[String]>,
        _options: &CallOptions,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Request(format!(
            "provider '{}' implements neither generate nor complete",
            self.llm_type()
        )))
    }

    /// Runs the model on a batch of prompts.
    async fn generate(
        &self,
        prompts: &[String],
        stop: Option<&[String]>,
        options: &CallOptions,
    ) -> Result<LLMResult, ProviderError> {
        let mut generations = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let text = self.complete(prompt, stop, options).await?;
            generations.push(vec![Generation::new(text)]);
        }
        Ok(LLMResult {
            generations,
            llm_output: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SingleCallLLM;

    #[async_trait]
    impl LLM for SingleCallLLM {
        fn llm_type(&self) -> &str {
            "single"
        }

        async fn complete(
            &self,
            prompt: &str,
            _stop: Option<&[String]>,
            _options: &CallOptions,
        ) -> Result<String, ProviderError> {
            Ok(prompt.to_uppercase())
        }
    }

    struct EmptyLLM;

    #[async_trait]
    impl LLM for EmptyLLM {
        fn llm_type(&self) -> &str {
            "empty"
        }
    }

    #[tokio::test]
    async fn default_generate_runs_complete_per_prompt() {
        let prompts = vec!["a".to_string(), "b".to_string()];
        let result = SingleCallLLM
            .generate(&prompts, None, &CallOptions::default())
            .await
            .unwrap();

        assert_eq!(result.generations.len(), 2);
        assert_eq!(result.generations[0], vec![Generation::new("A")]);
        assert_eq!(result.generations[1], vec![Generation::new("B")]);
        assert!(result.llm_output.is_none());
    }

    #[tokio::test]
    async fn provider_without_primitives_reports_request_error() {
        let prompts = vec!["a".to_string()];
        let result = EmptyLLM
            .generate(&prompts, None, &CallOptions::default())
            .await;

        assert!(matches!(result, Err(ProviderError::Request(_))));
    }

    #[test]
    fn rate_limit_message_is_classified_with_retry_delay() {
        let body = serde_json::json!({
            "error": {
                "code": 429,
                "message": "Rate limit exceeded",
                "status": "RESOURCE_EXHAUSTED",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.RetryInfo",
                    "retryDelay": "2s"
                }]
            }
        });
        let error = ProviderError::from_message(format!("CompletionError: {}", body));

        assert!(error.is_rate_limited());
        assert_eq!(error.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn other_status_codes_are_plain_request_errors() {
        let body = serde_json::json!({"error": {"code": 500, "message": "boom"}});
        let error = ProviderError::from_message(body.to_string());

        assert!(!error.is_rate_limited());
        assert!(matches!(error, ProviderError::Request(_)));
        assert!(matches!(
            ProviderError::from_message("connection reset"),
            ProviderError::Request(_)
        ));
    }

    #[test]
    fn generation_info_is_omitted_when_absent() {
        let json = serde_json::to_value(Generation::new("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hi"}));
    }
}
