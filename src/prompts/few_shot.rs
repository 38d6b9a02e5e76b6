use super::engine::TemplateEngine;
use super::{PromptTemplate, TemplateError, merge_partials, merge_values, remaining_inputs};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A prompt made of a prefix, a list of formatted examples and a suffix,
/// joined by a separator (a newline by default).
///
/// Prefix and suffix are templates over the input variables; each example is
/// a JSON object rendered with the example prompt.
#[derive(Clone)]
pub struct FewShotPromptTemplate {
    examples: Vec<Value>,
    example_prompt: PromptTemplate,
    prefix: Arc<TemplateEngine>,
    suffix: Arc<TemplateEngine>,
    example_separator: String,
    input_variables: Vec<String>,
    partial_variables: Map<String, Value>,
}

impl FewShotPromptTemplate {
    pub fn new<I, S>(
        example_prompt: PromptTemplate,
        examples: Vec<Value>,
        input_variables: I,
    ) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            examples,
            example_prompt,
            prefix: Arc::new(TemplateEngine::compile("")?),
            suffix: Arc::new(TemplateEngine::compile("")?),
            example_separator: "\n".to_string(),
            input_variables: input_variables.into_iter().map(Into::into).collect(),
            partial_variables: Map::new(),
        })
    }

    pub fn with_prefix(mut self, prefix: &str) -> Result<Self, TemplateError> {
        self.prefix = Arc::new(TemplateEngine::compile(prefix)?);
        Ok(self)
    }

    pub fn with_suffix(mut self, suffix: &str) -> Result<Self, TemplateError> {
        self.suffix = Arc::new(TemplateEngine::compile(suffix)?);
        Ok(self)
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.example_separator = separator.into();
        self
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Returns a copy with some variables already bound.
    pub fn partial(&self, values: &Value) -> Result<Self, TemplateError> {
        let partial_variables = merge_partials(&self.partial_variables, values)?;
        Ok(Self {
            input_variables: remaining_inputs(&self.input_variables, &partial_variables),
            partial_variables,
            ..self.clone()
        })
    }

    pub fn format(&self, values: &Value) -> Result<String, TemplateError> {
        let merged = Value::Object(merge_values(
            &self.input_variables,
            &self.partial_variables,
            values,
        )?);

        let mut pieces = Vec::with_capacity(self.examples.len() + 2);
        pieces.push(self.prefix.render(&merged)?);
        for example in &self.examples {
            pieces.push(self.example_prompt.format(example)?);
        }
        pieces.push(self.suffix.render(&merged)?);
        Ok(pieces.join(&self.example_separator))
    }
}

impl fmt::Debug for FewShotPromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FewShotPromptTemplate")
            .field("examples", &self.examples.len())
            .field("example_prompt", &self.example_prompt)
            .field("input_variables", &self.input_variables)
            .field("partial_variables", &self.partial_variables)
            .finish()
    }
}
