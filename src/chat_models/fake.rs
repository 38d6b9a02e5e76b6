//! Fake chat model: replies with a fixed text or echoes the last user message.
//! Used for testing chat flows without a real provider.

use super::{ChatMessage, ChatModel, Role};
use crate::llm::ProviderError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Default)]
pub struct FakeChatModel {
    reply: Option<String>,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `reply`.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Fail every call with a request error carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of provider invocations so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    fn model_type(&self) -> &str {
        "fake-chat"
    }

    fn identifying_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(reply) = &self.reply {
            params.insert("reply".to_string(), Value::from(reply.as_str()));
        }
        params
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _stop: Option<&[String]>,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(ProviderError::Request(message.clone()));
        }
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.text.as_str())
            .unwrap_or_default();
        Ok(format!("[echo] {}", last_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_user_message() {
        let model = FakeChatModel::new();
        let messages = vec![
            ChatMessage::system("be nice"),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("second"),
        ];

        let result = model.generate(&messages, None).await.unwrap();

        assert_eq!(result.generations.len(), 1);
        assert_eq!(result.generations[0].message, ChatMessage::assistant("[echo] second"));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn fixed_reply_wins() {
        let model = FakeChatModel::new().with_reply("hello");
        let text = model.complete(&[], None).await.unwrap();
        assert_eq!(text, "hello");
    }
}
