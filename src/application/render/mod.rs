//! Template rendering.
//!
//! The compiler is pure: it parses markup and executes it against a
//! [`RenderContext`]. The [`RenderPipeline`] layers template resolution,
//! Markdown conversion and the compiled-template cache on top of it.

mod compiler;
mod markdown;
mod pipeline;
mod types;

pub use compiler::{CompiledTemplate, Compiler};
pub use markdown::{ComrakMarkdown, MarkdownConverter, MarkdownError};
pub use pipeline::RenderPipeline;
pub use types::{ListContext, ListItem, PageContext, RenderContext, RenderError};
