//! Template compiler backed by `minijinja`.
//!
//! Pure and stateless: `compile` parses markup into an owned environment
//! holding exactly one template; `CompiledTemplate::render` executes it. No
//! caching happens here.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use super::types::{RenderContext, RenderError};

const TEMPLATE_NAME: &str = "template.html";

#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Parse `source`, reporting syntax errors without executing anything.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate, RenderError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        // Missing fields and attributes of missing fields render empty.
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_template_owned(TEMPLATE_NAME, source.to_owned())
            .map_err(|err| RenderError::syntax(&err))?;

        Ok(CompiledTemplate { env })
    }
}

/// Executable form of a template.
#[derive(Debug)]
pub struct CompiledTemplate {
    env: Environment<'static>,
}

impl CompiledTemplate {
    /// Execute against `context`. Output is produced in full or not at all.
    pub fn render(&self, context: &RenderContext) -> Result<String, RenderError> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|err| RenderError::execution(&err))?;
        template
            .render(context)
            .map_err(|err| RenderError::execution(&err))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: serde_json::Value) -> RenderContext {
        RenderContext::from_json(value)
    }

    #[test]
    fn compiles_and_renders_fields() {
        let compiled = Compiler::new()
            .compile("<h1>{{ title }}</h1>")
            .expect("valid template");
        let html = compiled.render(&map(json!({"title": "Hi"}))).unwrap();
        assert_eq!(html, "<h1>Hi</h1>");
    }

    #[test]
    fn escapes_plain_strings() {
        let compiled = Compiler::new().compile("{{ title }}").unwrap();
        let html = compiled
            .render(&map(json!({"title": "<b>x"})))
            .unwrap();
        assert_eq!(html, "&lt;b&gt;x");
    }

    #[test]
    fn syntax_error_is_reported_at_compile_time() {
        let err = Compiler::new().compile("{% if %}").unwrap_err();
        assert!(matches!(err, RenderError::Syntax { .. }), "{err:?}");

        let err = Compiler::new().compile("{{ title ").unwrap_err();
        assert!(matches!(err, RenderError::Syntax { .. }), "{err:?}");
    }

    #[test]
    fn missing_fields_render_empty() {
        let compiled = Compiler::new()
            .compile("[{{ absent }}][{{ absent.nested }}]")
            .unwrap();
        assert_eq!(compiled.render(&RenderContext::empty()).unwrap(), "[][]");
    }

    #[test]
    fn unknown_function_fails_at_execution() {
        let compiled = Compiler::new().compile("{{ no_such_helper() }}").unwrap();
        let err = compiled.render(&RenderContext::empty()).unwrap_err();
        assert!(matches!(err, RenderError::Execution { .. }), "{err:?}");
    }

    #[test]
    fn type_mismatch_fails_at_execution() {
        let compiled = Compiler::new().compile("{{ title + 1 }}").unwrap();
        let err = compiled
            .render(&map(json!({"title": "text"})))
            .unwrap_err();
        assert!(matches!(err, RenderError::Execution { .. }), "{err:?}");
    }
}
