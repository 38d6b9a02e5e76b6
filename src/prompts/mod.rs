//! Prompt templates rendered with handlebars.

mod engine;
pub mod few_shot;

pub use few_shot::FewShotPromptTemplate;

use crate::llm::TYPE_KEY;
use engine::TemplateEngine;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Discriminator of a serialized [`PromptTemplate`].
pub const PROMPT_TYPE: &str = "prompt";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(#[from] handlebars::TemplateError),
    #[error("template render error: {0}")]
    Render(#[from] handlebars::RenderError),
    #[error("missing input variable '{0}'")]
    MissingVariable(String),
    #[error("invalid template data: {0}")]
    InvalidData(String),
}

/// A prompt with named input variables, e.g. `"Tell me a joke about {{topic}}"`.
#[derive(Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
    partial_variables: Map<String, Value>,
    engine: Arc<TemplateEngine>,
}

impl PromptTemplate {
    /// Compiles `template`. Fails when the template does not parse.
    pub fn new<I, S>(template: impl Into<String>, input_variables: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        let engine = TemplateEngine::compile(&template)?;
        Ok(Self {
            template,
            input_variables: input_variables.into_iter().map(Into::into).collect(),
            partial_variables: Map::new(),
            engine: Arc::new(engine),
        })
    }

    /// Returns a copy with some variables already bound.
    ///
    /// Bound variables are no longer inputs; values passed to
    /// [`PromptTemplate::format`] still take precedence over them.
    pub fn partial(&self, values: &Value) -> Result<Self, TemplateError> {
        let partial_variables = merge_partials(&self.partial_variables, values)?;
        Ok(Self {
            template: self.template.clone(),
            input_variables: remaining_inputs(&self.input_variables, &partial_variables),
            partial_variables,
            engine: self.engine.clone(),
        })
    }

    pub fn partial_variables(&self) -> &Map<String, Value> {
        &self.partial_variables
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Renders the template with `values`, which must be a JSON object
    /// holding every input variable.
    pub fn format(&self, values: &Value) -> Result<String, TemplateError> {
        let merged = merge_values(&self.input_variables, &self.partial_variables, values)?;
        Ok(self.engine.render(&Value::Object(merged))?)
    }

    pub fn serialize(&self) -> Map<String, Value> {
        let mut serialized = Map::new();
        serialized.insert(TYPE_KEY.to_string(), Value::from(PROMPT_TYPE));
        serialized.insert("template".to_string(), Value::from(self.template.as_str()));
        serialized.insert(
            "input_variables".to_string(),
            Value::from(self.input_variables.clone()),
        );
        if !self.partial_variables.is_empty() {
            serialized.insert(
                "partial_variables".to_string(),
                Value::Object(self.partial_variables.clone()),
            );
        }
        serialized
    }

    pub fn deserialize(data: &Value) -> Result<Self, TemplateError> {
        let kind = data.get(TYPE_KEY).and_then(Value::as_str);
        if kind.is_some_and(|kind| kind != PROMPT_TYPE) {
            return Err(TemplateError::InvalidData(format!(
                "expected a '{}' but found '{}'",
                PROMPT_TYPE,
                kind.unwrap_or_default()
            )));
        }
        let template = data
            .get("template")
            .and_then(Value::as_str)
            .ok_or_else(|| TemplateError::InvalidData("'template' must be a string".to_string()))?;
        let input_variables = match data.get("input_variables") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().map(str::to_string).ok_or_else(|| {
                        TemplateError::InvalidData("input variables must be strings".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(TemplateError::InvalidData(
                    "'input_variables' must be an array".to_string(),
                ));
            }
        };
        let partial_variables = match data.get("partial_variables") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(values)) => values.clone(),
            Some(_) => {
                return Err(TemplateError::InvalidData(
                    "'partial_variables' must be an object".to_string(),
                ));
            }
        };
        let mut prompt = Self::new(template, input_variables)?;
        prompt.partial_variables = partial_variables;
        Ok(prompt)
    }
}

pub(crate) fn values_object(values: &Value) -> Result<&Map<String, Value>, TemplateError> {
    values.as_object().ok_or_else(|| {
        TemplateError::InvalidData("prompt values must be a JSON object".to_string())
    })
}

/// `partials` extended with `values`, which must be a JSON object.
pub(crate) fn merge_partials(
    partials: &Map<String, Value>,
    values: &Value,
) -> Result<Map<String, Value>, TemplateError> {
    let mut merged = partials.clone();
    merged.extend(values_object(values)?.clone());
    Ok(merged)
}

pub(crate) fn remaining_inputs(inputs: &[String], partials: &Map<String, Value>) -> Vec<String> {
    inputs
        .iter()
        .filter(|name| !partials.contains_key(name.as_str()))
        .cloned()
        .collect()
}

/// Partials overlaid with `values`, after checking every input is present.
pub(crate) fn merge_values(
    inputs: &[String],
    partials: &Map<String, Value>,
    values: &Value,
) -> Result<Map<String, Value>, TemplateError> {
    let merged = merge_partials(partials, values)?;
    if let Some(missing) = inputs.iter().find(|name| !merged.contains_key(name.as_str())) {
        return Err(TemplateError::MissingVariable(missing.clone()));
    }
    Ok(merged)
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTemplate")
            .field("template", &self.template)
            .field("input_variables", &self.input_variables)
            .field("partial_variables", &self.partial_variables)
            .finish()
    }
}
