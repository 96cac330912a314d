use std::collections::BTreeMap;

use minijinja::Value;
use serde::Serialize;
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::types::TemplateType;

/// Structured errors surfaced by the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no active {template_type} template")]
    NoActiveTemplate { template_type: TemplateType },
    #[error("template syntax error: {message}")]
    Syntax {
        message: String,
        line: Option<usize>,
    },
    #[error("template execution failed: {message}")]
    Execution { message: String },
    #[error("template lookup failed: {0}")]
    Repo(#[from] RepoError),
}

impl RenderError {
    pub(crate) fn syntax(error: &minijinja::Error) -> Self {
        Self::Syntax {
            message: describe(error),
            line: error.line(),
        }
    }

    pub(crate) fn execution(error: &minijinja::Error) -> Self {
        Self::Execution {
            message: describe(error),
        }
    }
}

fn describe(error: &minijinja::Error) -> String {
    match error.detail() {
        Some(detail) => format!("{}: {detail}", error.kind()),
        None => error.kind().to_string(),
    }
}

/// Data handed to a single content page.
///
/// `body`, `header` and `footer` carry pre-rendered HTML and are marked safe so
/// auto-escaping leaves them intact.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub site_name: String,
    pub title: String,
    pub body: Value,
    pub excerpt: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub slug: String,
    pub published_at: String,
    pub header: Value,
    pub footer: Value,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListItem {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub published_at: String,
}

/// Data handed to the article listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListContext {
    pub title: String,
    pub items: Vec<ListItem>,
    pub header: Value,
    pub footer: Value,
    pub year: i32,
}

/// Every shape of data a template can execute against.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RenderContext {
    Page(PageContext),
    List(ListContext),
    /// Free-form fields, used by previews and for fragments (empty).
    Map(BTreeMap<String, serde_json::Value>),
}

impl RenderContext {
    /// Context with no fields; fragments render against this.
    pub fn empty() -> Self {
        RenderContext::Map(BTreeMap::new())
    }

    /// Builds a map context from a JSON object; any other JSON value yields
    /// an empty context.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(fields) => RenderContext::Map(fields.into_iter().collect()),
            _ => RenderContext::empty(),
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn no_active_page_template_message() {
        let err = RenderError::NoActiveTemplate {
            template_type: TemplateType::Page,
        };
        assert_eq!(err.to_string(), "no active page template");
    }

    #[test]
    fn from_json_keeps_object_fields() {
        let ctx = RenderContext::from_json(json!({"name": "x", "n": 2}));
        match ctx {
            RenderContext::Map(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["name"], json!("x"));
            }
            other => panic!("unexpected context {other:?}"),
        }
    }

    #[test]
    fn from_json_non_object_is_empty() {
        match RenderContext::from_json(json!([1, 2])) {
            RenderContext::Map(fields) => assert!(fields.is_empty()),
            other => panic!("unexpected context {other:?}"),
        }
    }
}
