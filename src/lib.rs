//! # forgechain: cached, retryable, observable calls to language models.

/// The `cache` module memoizes generations per model configuration and prompt.
pub mod cache;
/// The `callbacks` module provides observers notified around every live model call.
pub mod callbacks;
/// The `chains` module composes prompt templates with models.
pub mod chains;
/// The `chat_models` module provides the role-tagged chat orchestrator.
pub mod chat_models;
/// The `config` module loads settings from TOML and the environment.
pub mod config;
/// The `llm` module provides the provider contract, the invocation orchestrator and retries.
pub mod llm;
/// The `memory` module keeps conversation history.
pub mod memory;
/// The `prompts` module provides handlebars prompt templates.
pub mod prompts;

pub use cache::{Cache, FileCache, InMemoryCache};
pub use callbacks::{CallbackHandler, CallbackManager, RunCollector, TracingHandler};
pub use chains::LlmChain;
pub use chat_models::{ChatClient, ChatMessage, ChatModel, Role};
pub use config::Settings;
pub use llm::{BaseLLM, LLM, LLMError, LLMFactory, ProviderError, ProviderRegistry, RetryConfig};
pub use prompts::{FewShotPromptTemplate, PromptTemplate};
