use super::{CallbackHandler, ModelInfo};
use crate::chat_models::{ChatMessage, ChatResult};
use crate::llm::LLMResult;
use tracing::{debug, error, info};

/// Logs every model event through `tracing`.
///
/// Verbose calls log at `INFO`, the rest at `DEBUG`. Errors always log at `ERROR`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

impl TracingHandler {
    pub fn new() -> Self {
        Self
    }
}

impl CallbackHandler for TracingHandler {
    fn on_llm_start(&self, model: &ModelInfo, prompts: &[String], verbose: bool) {
        if verbose {
            info!(model = %model.name, prompt_count = prompts.len(), "LLM call started");
        } else {
            debug!(model = %model.name, prompt_count = prompts.len(), "LLM call started");
        }
    }

    fn on_llm_end(&self, result: &LLMResult, verbose: bool) {
        let generation_count: usize = result.generations.iter().map(Vec::len).sum();
        if verbose {
            for (index, generations) in result.generations.iter().enumerate() {
                for generation in generations {
                    info!(prompt_index = index, text = %generation.text, "LLM generation");
                }
            }
        }
        debug!(generation_count, "LLM call finished");
    }

    fn on_llm_error(&self, err: &str, _verbose: bool) {
        error!(error = %err, "LLM call failed");
    }

    fn on_chat_model_start(&self, model: &ModelInfo, messages: &[ChatMessage], verbose: bool) {
        if verbose {
            info!(model = %model.name, message_count = messages.len(), "Chat call started");
        } else {
            debug!(model = %model.name, message_count = messages.len(), "Chat call started");
        }
    }

    fn on_chat_model_end(&self, result: &ChatResult, verbose: bool) {
        if verbose {
            for generation in &result.generations {
                info!(role = %generation.message.role, text = %generation.message.text, "Chat generation");
            }
        }
        debug!(generation_count = result.generations.len(), "Chat call finished");
    }
}
