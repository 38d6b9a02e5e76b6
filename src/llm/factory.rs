use crate::llm::config::RetryConfig;
use crate::llm::core::{LLM, LLMError, SerializedLLM, TYPE_KEY};
use crate::llm::decorators::RetryingLLM;
use crate::llm::fake::FakeLLM;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Factory for creating LLM instances with optional decorators.
///
/// Wraps base providers with decorators (like retry logic) based on
/// configuration, without changing their interface.
pub struct LLMFactory;

impl LLMFactory {
    /// Create an LLM instance with optional retry decoration.
    ///
    /// # Arguments
    ///
    /// * `base_llm` - The base LLM implementation to potentially wrap
    /// * `retry_config` - Optional retry configuration. If None, or if it allows
    ///   only a single attempt, no retry is applied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use forgechain::llm::{FakeLLM, LLM, LLMFactory, RetryConfig};
    /// use std::sync::Arc;
    ///
    /// let llm = LLMFactory::create(Arc::new(FakeLLM::default()), Some(RetryConfig::default()));
    /// assert_eq!(llm.llm_type(), "fake");
    /// ```
    pub fn create(base_llm: Arc<dyn LLM>, retry_config: Option<RetryConfig>) -> Arc<dyn LLM> {
        match retry_config {
            Some(config) if config.retries_enabled() => {
                tracing::debug!(
                    max_attempts = config.max_attempts,
                    min_delay_ms = config.min_delay.as_millis() as u64,
                    max_delay_ms = config.max_delay.as_millis() as u64,
                    strategy = ?config.strategy,
                    only_rate_limits = config.only_retry_rate_limits,
                    "Wrapping LLM with retry decorator"
                );
                Arc::new(RetryingLLM::new(base_llm, config))
            }
            Some(_) => {
                tracing::debug!("Retry config allows a single attempt, using base LLM without retry");
                base_llm
            }
            None => {
                tracing::debug!("No retry config provided, using base LLM without retry");
                base_llm
            }
        }
    }

    /// Create an LLM instance with default retry configuration.
    pub fn create_with_default_retry(base_llm: Arc<dyn LLM>) -> Arc<dyn LLM> {
        Self::create(base_llm, Some(RetryConfig::default()))
    }
}

/// Builds a provider from its serialized parameters (the `_type` key removed).
pub type ProviderConstructor =
    Box<dyn Fn(Map<String, Value>) -> Result<Arc<dyn LLM>, LLMError> + Send + Sync>;

/// Maps `_type` discriminators to provider constructors.
///
/// Populate it once at start-up; [`ProviderRegistry::deserialize`] then turns
/// saved configurations back into providers.
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry knowing the providers shipped with this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.constructors.insert(
            "fake".to_string(),
            Box::new(|params| {
                FakeLLM::from_params(params)
                    .map(|llm| Arc::new(llm) as Arc<dyn LLM>)
                    .map_err(|e| LLMError::InvalidArgument(format!("invalid fake LLM parameters: {}", e)))
            }),
        );
        registry
    }

    /// Registers a constructor for `llm_type`.
    ///
    /// Registering the same type twice is a configuration error.
    pub fn register<F>(&mut self, llm_type: impl Into<String>, constructor: F) -> Result<(), LLMError>
    where
        F: Fn(Map<String, Value>) -> Result<Arc<dyn LLM>, LLMError> + Send + Sync + 'static,
    {
        let llm_type = llm_type.into();
        if self.constructors.contains_key(&llm_type) {
            return Err(LLMError::Configuration(format!(
                "provider type '{}' is already registered",
                llm_type
            )));
        }
        tracing::debug!(llm_type = %llm_type, "Registered provider type");
        self.constructors.insert(llm_type, Box::new(constructor));
        Ok(())
    }

    pub fn contains(&self, llm_type: &str) -> bool {
        self.constructors.contains_key(llm_type)
    }

    /// Reconstructs a provider from a serialized configuration.
    pub fn deserialize(&self, data: &Value) -> Result<Arc<dyn LLM>, LLMError> {
        let object = data.as_object().ok_or_else(|| {
            LLMError::InvalidArgument("serialized LLM must be a JSON object".to_string())
        })?;
        self.deserialize_map(object.clone())
    }

    /// Same as [`ProviderRegistry::deserialize`] for an already-unwrapped object.
    pub fn deserialize_map(&self, mut data: SerializedLLM) -> Result<Arc<dyn LLM>, LLMError> {
        let llm_type = match data.remove(TYPE_KEY) {
            Some(Value::String(llm_type)) => llm_type,
            Some(_) => {
                return Err(LLMError::InvalidArgument(format!(
                    "'{}' must be a string",
                    TYPE_KEY
                )));
            }
            None => {
                return Err(LLMError::InvalidArgument(format!(
                    "serialized LLM is missing '{}'",
                    TYPE_KEY
                )));
            }
        };
        let constructor = self
            .constructors
            .get(&llm_type)
            .ok_or_else(|| LLMError::UnknownProviderType(llm_type.clone()))?;
        constructor(data)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.constructors.keys().collect();
        types.sort();
        f.debug_struct("ProviderRegistry").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BaseLLM, CallOptions, ProviderError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct MockLLM {
        name: String,
    }

    impl MockLLM {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl LLM for MockLLM {
        fn llm_type(&self) -> &str {
            "mock"
        }

        fn identifying_params(&self) -> Map<String, Value> {
            let mut params = Map::new();
            params.insert("name".to_string(), Value::from(self.name.as_str()));
            params
        }

        async fn complete(
            &self,
            prompt: &str,
            _stop: Option<&[String]>,
            _options: &CallOptions,
        ) -> Result<String, ProviderError> {
            Ok(format!("{}: {}", self.name, prompt))
        }
    }

    async fn prompt(llm: Arc<dyn LLM>, text: &str) -> String {
        BaseLLM::new(llm)
            .call(text, None, &CallOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_without_retry_config() {
        let llm = LLMFactory::create(Arc::new(MockLLM::new("base")), None);
        assert_eq!(prompt(llm, "test").await, "base: test");
    }

    #[tokio::test]
    async fn test_create_with_retry_config() {
        let config = RetryConfig::default();
        let llm = LLMFactory::create(Arc::new(MockLLM::new("base")), Some(config));

        // The decorated LLM keeps the identity of the base LLM
        assert_eq!(llm.llm_type(), "mock");
        assert_eq!(prompt(llm, "test").await, "base: test");
    }

    #[tokio::test]
    async fn test_create_with_default_retry() {
        let llm = LLMFactory::create_with_default_retry(Arc::new(MockLLM::new("base")));
        assert_eq!(prompt(llm, "test").await, "base: test");
    }

    #[test]
    fn test_factory_decision_logic() {
        assert!(!RetryConfig::disabled().retries_enabled());
        assert!(RetryConfig::default().retries_enabled());
        let single = RetryConfig::new(1, Duration::ZERO, Duration::ZERO, RetryConfig::disabled().strategy);
        assert!(!single.retries_enabled());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let registry = ProviderRegistry::with_defaults();

        let result = registry.deserialize(&json!({"_type": "openai", "model": "gpt"}));

        assert!(matches!(result, Err(LLMError::UnknownProviderType(t)) if t == "openai"));
    }

    #[test]
    fn malformed_data_is_an_invalid_argument() {
        let registry = ProviderRegistry::with_defaults();

        assert!(matches!(
            registry.deserialize(&json!(["fake"])),
            Err(LLMError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.deserialize(&json!({"model": "fake"})),
            Err(LLMError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.deserialize(&json!({"_type": 7})),
            Err(LLMError::InvalidArgument(_))
        ));
    }

    #[test]
    fn serialized_fake_round_trips() {
        let registry = ProviderRegistry::with_defaults();
        let original = BaseLLM::new(Arc::new(FakeLLM::new(crate::llm::FakeParams {
            model: "fake".to_string(),
            temperature: 0.7,
        })));

        let serialized = Value::Object(original.serialize());
        let restored = BaseLLM::new(registry.deserialize(&serialized).unwrap());

        assert_eq!(Value::Object(restored.serialize()), serialized);
    }

    #[test]
    fn duplicate_registration_is_a_configuration_error() {
        let mut registry = ProviderRegistry::with_defaults();

        let result = registry.register("fake", |_| Ok(Arc::new(MockLLM::new("x")) as Arc<dyn LLM>));
        assert!(matches!(result, Err(LLMError::Configuration(_))));

        registry
            .register("mock", |params| {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unnamed")
                    .to_string();
                Ok(Arc::new(MockLLM { name }) as Arc<dyn LLM>)
            })
            .unwrap();
        let llm = registry
            .deserialize(&json!({"_type": "mock", "name": "restored"}))
            .unwrap();
        assert_eq!(llm.identifying_params()["name"], "restored");
    }
}
