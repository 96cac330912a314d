//! Markdown conversion for content bodies stored as Markdown.

use comrak::options::{ListStyleType, Options};
use comrak::{Arena, format_html, parse_document};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("markdown conversion failed: {message}")]
    Conversion { message: String },
}

/// Converts Markdown to HTML. Callers treat a failure as degradable.
pub trait MarkdownConverter: Send + Sync {
    fn to_html(&self, source: &str) -> Result<String, MarkdownError>;
}

/// Comrak with the GFM extensions content authors expect.
///
/// Raw HTML passes through: content is authored by trusted admins.
pub struct ComrakMarkdown {
    options: Options<'static>,
}

impl ComrakMarkdown {
    pub fn new() -> Self {
        let mut options = Options::default();

        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.superscript = true;
        ext.footnotes = true;
        ext.description_lists = true;
        ext.front_matter_delimiter = Some("---".to_string());
        ext.alerts = true;
        ext.underline = true;

        let render = &mut options.render;
        render.github_pre_lang = true;
        render.tasklist_classes = true;
        render.list_style = ListStyleType::Dash;
        render.r#unsafe = true;
        render.sourcepos = false;

        Self { options }
    }
}

impl Default for ComrakMarkdown {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter for ComrakMarkdown {
    fn to_html(&self, source: &str) -> Result<String, MarkdownError> {
        let arena = Arena::new();
        let root = parse_document(&arena, source, &self.options);
        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| MarkdownError::Conversion {
            message: err.to_string(),
        })?;
        Ok(html)
    }
}
