//! Chains compose a prompt template with a model.

pub mod llm_chain;

pub use llm_chain::LlmChain;

use crate::llm::LLMError;
use crate::prompts::TemplateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("prompt error: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Llm(#[from] LLMError),
    #[error("invalid chain data: {0}")]
    InvalidData(String),
}
