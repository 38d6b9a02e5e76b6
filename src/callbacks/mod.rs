//! Observer hooks fired around every live provider invocation.
//!
//! Handlers are notified synchronously, in registration order. They only
//! observe: they cannot change a result, suppress an error or abort a call.
//! Cache hits never reach them.

pub mod run_collector;
pub mod tracing_handler;

pub use run_collector::{Run, RunCollector, RunStatus};
pub use tracing_handler::TracingHandler;

use crate::chat_models::{ChatMessage, ChatResult};
use crate::llm::{LLMResult, SerializedLLM};
use std::fmt;
use std::sync::Arc;

/// Identity of the model a callback event belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// The provider type, e.g. `"fake"`.
    pub name: String,
    /// The model's serialized configuration.
    pub serialized: SerializedLLM,
}

/// An observer of model invocations. Every method defaults to a no-op.
pub trait CallbackHandler: Send + Sync {
    fn on_llm_start(&self, _model: &ModelInfo, _prompts: &[String], _verbose: bool) {}

    fn on_llm_end(&self, _result: &LLMResult, _verbose: bool) {}

    /// Called with the string form of the provider error, before it is returned.
    fn on_llm_error(&self, _error: &str, _verbose: bool) {}

    fn on_chat_model_start(&self, _model: &ModelInfo, _messages: &[ChatMessage], _verbose: bool) {}

    fn on_chat_model_end(&self, _result: &ChatResult, _verbose: bool) {}
}

/// Fans callback events out to a list of handlers.
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl CallbackHandler for CallbackManager {
    fn on_llm_start(&self, model: &ModelInfo, prompts: &[String], verbose: bool) {
        for handler in &self.handlers {
            handler.on_llm_start(model, prompts, verbose);
        }
    }

    fn on_llm_end(&self, result: &LLMResult, verbose: bool) {
        for handler in &self.handlers {
            handler.on_llm_end(result, verbose);
        }
    }

    fn on_llm_error(&self, error: &str, verbose: bool) {
        for handler in &self.handlers {
            handler.on_llm_error(error, verbose);
        }
    }

    fn on_chat_model_start(&self, model: &ModelInfo, messages: &[ChatMessage], verbose: bool) {
        for handler in &self.handlers {
            handler.on_chat_model_start(model, messages, verbose);
        }
    }

    fn on_chat_model_end(&self, result: &ChatResult, verbose: bool) {
        for handler in &self.handlers {
            handler.on_chat_model_end(result, verbose);
        }
    }
}
