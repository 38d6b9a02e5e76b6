use handlebars::{Handlebars, handlebars_helper, no_escape};
use serde_json::Value;

const TEMPLATE_NAME: &str = "prompt";

/// A handlebars registry holding a single compiled prompt template.
///
/// Output is never HTML-escaped and strict mode is on, so a variable missing
/// from the render data is an error instead of an empty string. The `verbatim`
/// helper renders any value as compact JSON.
pub(crate) struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub(crate) fn compile(template: &str) -> Result<Self, handlebars::TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars_helper!(verbatim: |v: Value| v.to_string());
        handlebars.register_escape_fn(no_escape);
        handlebars.register_helper("verbatim", Box::new(verbatim));
        handlebars.set_strict_mode(true);
        handlebars.register_template_string(TEMPLATE_NAME, template)?;
        Ok(Self { handlebars })
    }

    pub(crate) fn render(&self, data: &Value) -> Result<String, handlebars::RenderError> {
        self.handlebars.render(TEMPLATE_NAME, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let engine = TemplateEngine::compile("Hello, {{name}}!").unwrap();
        let data = serde_json::json!({"name": "World"});
        let rendered = engine.render(&data).unwrap();
        assert_eq!(rendered, "Hello, World!");
    }

    #[test]
    fn it_works_with_complex_data() {
        let engine = TemplateEngine::compile("my story, {{verbatim story}}!").unwrap();
        let data = serde_json::json!({"story": [{"year": 1920, "work": "novel"}, {"year": 1930, "work": "poem"}]});
        let rendered = engine.render(&data).unwrap();
        assert_eq!(
            rendered,
            "my story, [{\"work\":\"novel\",\"year\":1920},{\"work\":\"poem\",\"year\":1930}]!"
        );
    }

    #[test]
    fn markup_is_not_escaped() {
        let engine = TemplateEngine::compile("{{snippet}}").unwrap();
        let rendered = engine
            .render(&serde_json::json!({"snippet": "<b>a & b</b>"}))
            .unwrap();
        assert_eq!(rendered, "<b>a & b</b>");
    }

    #[test]
    fn missing_variable_fails_in_strict_mode() {
        let engine = TemplateEngine::compile("Hello, {{name}}!").unwrap();
        assert!(engine.render(&serde_json::json!({})).is_err());
    }
}
