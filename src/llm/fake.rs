//! Fake LLM provider. Answers deterministically without any network call.
//!
//! Registered under the `fake` type, so serialized configurations using it
//! round-trip through [`ProviderRegistry`](crate::llm::ProviderRegistry).
//! Every clone shares the same call log, which makes it convenient for
//! asserting how often (and with what) the provider was actually invoked.

use crate::llm::core::{CallOptions, LLM, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Identifying parameters of a [`FakeLLM`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeParams {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
}

fn default_model() -> String {
    "fake".to_string()
}

impl Default for FakeParams {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeLLM {
    params: FakeParams,
    responses: Vec<String>,
    failure: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeLLM {
    pub fn new(params: FakeParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Builds a fake from serialized parameters (without the `_type` key).
    pub fn from_params(params: Map<String, Value>) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_value(Value::Object(params))?))
    }

    /// Answer with these texts in turn, cycling when they run out.
    pub fn with_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses = responses.into_iter().map(Into::into).collect();
        self
    }

    /// Fail every call with a request error carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn params(&self) -> &FakeParams {
        &self.params
    }

    /// Number of prompts the provider has been invoked with.
    pub fn calls(&self) -> usize {
        self.lock().len()
    }

    /// Every prompt the provider has been invoked with, in call order.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LLM for FakeLLM {
    fn llm_type(&self) -> &str {
        "fake"
    }

    fn identifying_params(&self) -> Map<String, Value> {
        match serde_json::to_value(&self.params) {
            Ok(Value::Object(params)) => params,
            _ => Map::new(),
        }
    }

    async fn complete(
        &self,
        prompt: &str,
        _stop: Option<&[String]>,
        _options: &CallOptions,
    ) -> Result<String, ProviderError> {
        let call_index = {
            let mut prompts = self.lock();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };
        if let Some(message) = &self.failure {
            return Err(ProviderError::Request(message.clone()));
        }
        if self.responses.is_empty() {
            return Ok(format!("{} response to: {}", self.params.model, prompt));
        }
        Ok(self.responses[call_index % self.responses.len()].clone())
    }
}
