//! Conversation memory for chat flows.

use crate::chat_models::ChatMessage;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("expected a single text value, found {0} keys")]
    AmbiguousValue(usize),
    #[error("value under '{0}' is not a string")]
    NotText(String),
}

/// The ordered messages of one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatMessageHistory {
    messages: Vec<ChatMessage>,
}

impl ChatMessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn add_ai_message(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Stores each exchange of a chain in a [`ChatMessageHistory`] and exposes
/// it to prompts under `memory_key` (`"history"` by default).
#[derive(Debug, Clone)]
pub struct ChatMessageMemory {
    history: ChatMessageHistory,
    memory_key: String,
}

impl Default for ChatMessageMemory {
    fn default() -> Self {
        Self {
            history: ChatMessageHistory::new(),
            memory_key: "history".to_string(),
        }
    }
}

impl ChatMessageMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_key(mut self, memory_key: impl Into<String>) -> Self {
        self.memory_key = memory_key.into();
        self
    }

    pub fn with_history(mut self, history: ChatMessageHistory) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &ChatMessageHistory {
        &self.history
    }

    /// Records one exchange. `inputs` and `outputs` must each hold exactly
    /// one string value.
    pub fn save_context(
        &mut self,
        inputs: &Map<String, Value>,
        outputs: &Map<String, Value>,
    ) -> Result<(), MemoryError> {
        let input = single_text(inputs)?;
        let output = single_text(outputs)?;
        self.history.add_user_message(input);
        self.history.add_ai_message(output);
        Ok(())
    }

    /// The stored conversation as `{memory_key: [messages...]}`.
    pub fn load_memory_variables(&self) -> Map<String, Value> {
        let messages = self
            .history
            .messages()
            .iter()
            .map(|message| {
                serde_json::to_value(message).unwrap_or_else(|_| Value::from(message.text.as_str()))
            })
            .collect();
        let mut variables = Map::new();
        variables.insert(self.memory_key.clone(), Value::Array(messages));
        variables
    }
}

fn single_text(values: &Map<String, Value>) -> Result<&str, MemoryError> {
    if values.len() != 1 {
        return Err(MemoryError::AmbiguousValue(values.len()));
    }
    let (key, value) = values
        .iter()
        .next()
        .ok_or(MemoryError::AmbiguousValue(0))?;
    value
        .as_str()
        .ok_or_else(|| MemoryError::NotText(key.clone()))
}
