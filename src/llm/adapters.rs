use crate::llm::core::{CallOptions, LLM, ProviderError};
use async_trait::async_trait;
use rig::{agent::Agent as RigAgent, completion::CompletionModel};
use serde_json::{Map, Value};
use tracing::debug;

/// Adapter implementations for third-party LLM providers.
///
/// `RigLLM` lets any `rig::Agent` serve as a provider behind
/// [`BaseLLM`](crate::llm::BaseLLM). The `rig` library provides agents that
/// talk to OpenAI, Anthropic, Google Gemini and others.
///
/// # Example
///
/// ```rust,ignore
/// use forgechain::llm::{BaseLLM, RigLLM};
/// use rig::{providers::openai, client::CompletionClient};
/// use std::sync::Arc;
///
/// let openai_client = openai::Client::from_env();
/// let agent = openai_client
///     .agent("gpt-4")
///     .preamble("You are a helpful assistant")
///     .build();
///
/// let llm = BaseLLM::new(Arc::new(RigLLM::new(agent, "gpt-4")));
/// ```
///
/// The model name is the only identifying parameter rig exposes, so it is
/// what distinguishes cache entries of different agents.
pub struct RigLLM<M: CompletionModel> {
    agent: RigAgent<M>,
    model_name: String,
}

impl<M: CompletionModel> RigLLM<M> {
    pub fn new(agent: RigAgent<M>, model_name: impl Into<String>) -> Self {
        Self {
            agent,
            model_name: model_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl<M> LLM for RigLLM<M>
where
    M: CompletionModel + 'static,
{
    fn llm_type(&self) -> &str {
        "rig"
    }

    fn identifying_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(
            "model_name".to_string(),
            Value::from(self.model_name.as_str()),
        );
        params
    }

    // rig agents have no per-request stop sequences; they are ignored here.
    async fn complete(
        &self,
        prompt: &str,
        _stop: Option<&[String]>,
        _options: &CallOptions,
    ) -> Result<String, ProviderError> {
        rig::completion::Prompt::prompt(&self.agent, prompt.to_string())
            .await
            .map_err(|e| {
                debug!(model = %self.model_name, "Rig agent error: {}", e);
                ProviderError::from_message(e.to_string())
            })
    }
}
