// The `run_collector` module records model invocations as a list of runs.

use super::{CallbackHandler, ModelInfo};
use crate::chat_models::{ChatMessage, ChatResult};
use crate::llm::LLMResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Lifecycle state of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// One live provider invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: Uuid,
    /// The provider type that served the run.
    pub model: String,
    /// Prompts, or `role: text` lines for chat runs.
    pub inputs: Vec<String>,
    /// Generated texts, flattened in prompt order.
    pub outputs: Vec<String>,
    pub error: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A callback handler that keeps a record of every run it observes.
///
/// End and error events close the most recently started run that is still
/// open. Calls that overlap on the same collector are therefore recorded
/// in nesting order, not necessarily in completion order.
#[derive(Debug, Default)]
pub struct RunCollector {
    runs: Mutex<Vec<Run>>,
}

impl RunCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every run recorded so far, oldest first.
    pub fn runs(&self) -> Vec<Run> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Run>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start(&self, model: &ModelInfo, inputs: Vec<String>) {
        self.lock().push(Run {
            id: Uuid::new_v4(),
            model: model.name.clone(),
            inputs,
            outputs: Vec::new(),
            error: None,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
        });
    }

    fn finish(&self, outputs: Vec<String>, error: Option<String>) {
        let mut runs = self.lock();
        if let Some(run) = runs
            .iter_mut()
            .rev()
            .find(|run| run.status == RunStatus::Running)
        {
            run.status = if error.is_some() {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            };
            run.outputs = outputs;
            run.error = error;
            run.ended_at = Some(Utc::now());
        }
    }
}

impl CallbackHandler for RunCollector {
    fn on_llm_start(&self, model: &ModelInfo, prompts: &[String], _verbose: bool) {
        self.start(model, prompts.to_vec());
    }

    fn on_llm_end(&self, result: &LLMResult, _verbose: bool) {
        let outputs = result
            .generations
            .iter()
            .flatten()
            .map(|generation| generation.text.clone())
            .collect();
        self.finish(outputs, None);
    }

    fn on_llm_error(&self, error: &str, _verbose: bool) {
        self.finish(Vec::new(), Some(error.to_string()));
    }

    fn on_chat_model_start(&self, model: &ModelInfo, messages: &[ChatMessage], _verbose: bool) {
        let inputs = messages
            .iter()
            .map(|message| format!("{}: {}", message.role, message.text))
            .collect();
        self.start(model, inputs);
    }

    fn on_chat_model_end(&self, result: &ChatResult, _verbose: bool) {
        let outputs = result
            .generations
            .iter()
            .map(|generation| generation.message.text.clone())
            .collect();
        self.finish(outputs, None);
    }
}
