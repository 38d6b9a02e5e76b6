use super::ChainError;
use crate::llm::{BaseLLM, CallOptions, LLMError, ProviderRegistry, TYPE_KEY};
use crate::prompts::PromptTemplate;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Discriminator of a serialized [`LlmChain`].
pub const LLM_CHAIN_TYPE: &str = "llm_chain";

const DEFAULT_OUTPUT_KEY: &str = "text";

/// Renders a prompt template and runs the result through a model.
///
/// # Examples
///
/// ```rust
/// use forgechain::chains::LlmChain;
/// use forgechain::llm::{BaseLLM, FakeLLM};
/// use forgechain::prompts::PromptTemplate;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), forgechain::chains::ChainError> {
/// let prompt = PromptTemplate::new("What is a good name for a company that makes {{product}}?", ["product"])?;
/// let chain = LlmChain::new(Arc::new(BaseLLM::new(Arc::new(FakeLLM::default()))), prompt);
///
/// let name = chain.call(&json!({"product": "colorful socks"})).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LlmChain {
    llm: Arc<BaseLLM>,
    prompt: PromptTemplate,
    output_key: String,
}

impl LlmChain {
    pub fn new(llm: Arc<BaseLLM>, prompt: PromptTemplate) -> Self {
        Self {
            llm,
            prompt,
            output_key: DEFAULT_OUTPUT_KEY.to_string(),
        }
    }

    pub fn with_output_key(mut self, output_key: impl Into<String>) -> Self {
        self.output_key = output_key.into();
        self
    }

    pub fn llm(&self) -> &Arc<BaseLLM> {
        &self.llm
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    /// Formats the prompt with `values` and returns the model's answer.
    pub async fn call(&self, values: &Value) -> Result<String, ChainError> {
        let prompt = self.prompt.format(values)?;
        debug!(prompt = %prompt, "Running LLM chain");
        self.llm
            .call(&prompt, None, &CallOptions::default())
            .await
            .map_err(|e| {
                error!(error = %e, "LLM chain call failed");
                ChainError::from(e)
            })
    }

    /// Like [`LlmChain::call`], but returns `values` extended with the answer
    /// under the chain's output key.
    pub async fn invoke(&self, values: &Value) -> Result<Map<String, Value>, ChainError> {
        let text = self.call(values).await?;
        let mut outputs = values.as_object().cloned().unwrap_or_default();
        outputs.insert(self.output_key.clone(), Value::from(text));
        Ok(outputs)
    }

    /// Runs the chain over several inputs with a single batched model call.
    pub async fn apply(&self, inputs: &[Value]) -> Result<Vec<String>, ChainError> {
        let prompts = inputs
            .iter()
            .map(|values| self.prompt.format(values))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(batch_size = prompts.len(), "Applying LLM chain");

        let result = self
            .llm
            .generate(&prompts, None, &CallOptions::default())
            .await?;
        result
            .generations
            .into_iter()
            .map(|generations| {
                generations
                    .into_iter()
                    .next()
                    .map(|generation| generation.text)
                    .ok_or(ChainError::Llm(LLMError::EmptyGeneration))
            })
            .collect()
    }

    pub fn serialize(&self) -> Map<String, Value> {
        let mut serialized = Map::new();
        serialized.insert(TYPE_KEY.to_string(), Value::from(LLM_CHAIN_TYPE));
        serialized.insert("llm".to_string(), Value::Object(self.llm.serialize()));
        serialized.insert("prompt".to_string(), Value::Object(self.prompt.serialize()));
        serialized.insert(
            "output_key".to_string(),
            Value::from(self.output_key.as_str()),
        );
        serialized
    }

    /// Rebuilds a chain from [`LlmChain::serialize`] output.
    ///
    /// The model is reconstructed through `registry`; it starts without a
    /// cache or callbacks.
    pub fn deserialize(data: &Value, registry: &ProviderRegistry) -> Result<Self, ChainError> {
        if data.get(TYPE_KEY).and_then(Value::as_str) != Some(LLM_CHAIN_TYPE) {
            return Err(ChainError::InvalidData(format!(
                "'{}' must be '{}'",
                TYPE_KEY, LLM_CHAIN_TYPE
            )));
        }
        let llm_data = data
            .get("llm")
            .ok_or_else(|| ChainError::InvalidData("missing 'llm'".to_string()))?;
        let prompt_data = data
            .get("prompt")
            .ok_or_else(|| ChainError::InvalidData("missing 'prompt'".to_string()))?;

        let llm = BaseLLM::new(registry.deserialize(llm_data)?);
        let prompt = PromptTemplate::deserialize(prompt_data)?;
        let output_key = data
            .get("output_key")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_OUTPUT_KEY);

        Ok(Self::new(Arc::new(llm), prompt).with_output_key(output_key))
    }
}
