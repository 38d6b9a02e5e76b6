use super::{ChatMessage, ChatModel, ChatResult};
use crate::callbacks::{CallbackHandler, CallbackManager, ModelInfo};
use crate::llm::{LLMError, SerializedLLM, TYPE_KEY};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Orchestrates calls to a [`ChatModel`]: input validation, callbacks and
/// error propagation. Results are never cached.
#[derive(Clone)]
pub struct ChatClient {
    model: Arc<dyn ChatModel>,
    callbacks: CallbackManager,
    verbose: bool,
}

impl ChatClient {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            callbacks: CallbackManager::default(),
            verbose: true,
        }
    }

    pub fn with_callbacks(mut self, callbacks: CallbackManager) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// The model's identifying parameters plus its `_type`.
    pub fn serialize(&self) -> SerializedLLM {
        let mut serialized = self.model.identifying_params();
        serialized.insert(TYPE_KEY.to_string(), Value::from(self.model.model_type()));
        serialized
    }

    /// Runs the model on a conversation. Always a live provider call.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        stop: Option<&[String]>,
    ) -> Result<ChatResult, LLMError> {
        if messages.is_empty() {
            return Err(LLMError::InvalidArgument(
                "messages must contain at least one message".to_string(),
            ));
        }

        let info = ModelInfo {
            name: self.model.model_type().to_string(),
            serialized: self.serialize(),
        };
        debug!(model = %info.name, message_count = messages.len(), "Invoking chat model");
        self.callbacks
            .on_chat_model_start(&info, messages, self.verbose);

        let output = match self.model.generate(messages, stop).await {
            Ok(output) => output,
            Err(e) => {
                self.callbacks.on_llm_error(&e.to_string(), self.verbose);
                return Err(LLMError::Provider(e));
            }
        };

        self.callbacks.on_chat_model_end(&output, self.verbose);
        Ok(output)
    }

    /// Runs the model and returns the first produced message.
    pub async fn run(
        &self,
        messages: &[ChatMessage],
        stop: Option<&[String]>,
    ) -> Result<ChatMessage, LLMError> {
        let result = self.generate(messages, stop).await?;
        result
            .generations
            .into_iter()
            .next()
            .map(|generation| generation.message)
            .ok_or(LLMError::EmptyGeneration)
    }
}
