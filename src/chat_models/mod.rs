//! Chat models: multi-turn, role-tagged message calls.
//!
//! Unlike plain LLM calls there is no cache layer here; every `generate` is a
//! live provider invocation.

pub mod base;
pub mod fake;

pub use base::ChatClient;
pub use fake::FakeChatModel;

use crate::llm::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub role: Role,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }
}

/// One produced message plus raw provider info (e.g. the finish reason).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGeneration {
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub generations: Vec<ChatGeneration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<Map<String, Value>>,
}

/// The contract for a chat provider.
///
/// Implement [`ChatModel::generate`] for full control over the result, or just
/// [`ChatModel::complete`], whose text the default `generate` wraps in a single
/// message authored by [`ChatModel::role`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_type(&self) -> &str;

    fn identifying_params(&self) -> Map<String, Value> {
        Map::new()
    }

    /// The role attached to messages produced by [`ChatModel::complete`].
    fn role(&self) -> Role {
        Role::Assistant
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _stop: Option<&[String]>,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Request(format!(
            "chat model '{}' implements neither generate nor complete",
            self.model_type()
        )))
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        stop: Option<&[String]>,
    ) -> Result<ChatResult, ProviderError> {
        let text = self.complete(messages, stop).await?;
        Ok(ChatResult {
            generations: vec![ChatGeneration {
                message: ChatMessage::new(self.role(), text),
                generation_info: None,
            }],
            llm_output: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::system("be brief");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, serde_json::json!({"text": "be brief", "role": "system"}));

        let parsed: ChatMessage =
            serde_json::from_value(serde_json::json!({"text": "hi", "role": "user"})).unwrap();
        assert_eq!(parsed, ChatMessage::user("hi"));
    }
}
