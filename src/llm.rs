//! Text-completion models: the provider contract, the caching orchestrator in
//! front of it, and the retry decoration applied to outbound calls.

pub mod adapters;
pub mod base;
pub mod config;
pub mod core;
pub mod decorators;
pub mod factory;
pub mod fake;
pub mod retry;

pub use adapters::RigLLM;
pub use base::BaseLLM;
pub use config::{RetryConfig, RetryStrategy};
pub use self::core::{
    CallOptions, Generation, LLM, LLMError, LLMResult, ProviderError, SerializedLLM, TYPE_KEY,
};
pub use decorators::RetryingLLM;
pub use factory::{LLMFactory, ProviderConstructor, ProviderRegistry};
pub use fake::{FakeLLM, FakeParams};
pub use retry::{backoff_delays, retry, retry_if};
