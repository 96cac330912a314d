//! Render pipeline.
//!
//! Resolves the active templates for a view, assembles the data context and
//! executes the compiled template. Compiled templates are looked up in the
//! [`TemplateCache`] by `(id, version)` and compiled on a miss. Ad hoc
//! renders (`validate_and_render`) bypass the cache entirely.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use minijinja::Value;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use tracing::{debug, instrument, warn};

use crate::application::repos::TemplateStore;
use crate::cache::TemplateCache;
use crate::domain::entities::{ContentRecord, TemplateRecord};
use crate::domain::types::{BodyFormat, TemplateType};

use super::compiler::{CompiledTemplate, Compiler};
use super::markdown::MarkdownConverter;
use super::types::{ListContext, ListItem, PageContext, RenderContext, RenderError};

const PUBLISHED_AT_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

const METRIC_RENDER_MS: &str = "vellum_render_ms";
const METRIC_COMPILE_MS: &str = "vellum_l1_compile_ms";

pub struct RenderPipeline {
    templates: Arc<dyn TemplateStore>,
    cache: Arc<TemplateCache>,
    markdown: Arc<dyn MarkdownConverter>,
    compiler: Compiler,
    site_name: String,
}

impl RenderPipeline {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        cache: Arc<TemplateCache>,
        markdown: Arc<dyn MarkdownConverter>,
        site_name: impl Into<String>,
    ) -> Self {
        Self {
            templates,
            cache,
            markdown,
            compiler: Compiler::new(),
            site_name: site_name.into(),
        }
    }

    /// Render a single content item with the active page template.
    #[instrument(skip(self, content), fields(slug = %content.slug))]
    pub async fn render_page(&self, content: &ContentRecord) -> Result<String, RenderError> {
        let started = Instant::now();

        let header = self.templates.find_active_by_type(TemplateType::Header).await?;
        let footer = self.templates.find_active_by_type(TemplateType::Footer).await?;
        let page = self.require_active(TemplateType::Page).await?;

        let context = RenderContext::Page(PageContext {
            site_name: self.site_name.clone(),
            title: content.title.clone(),
            body: Value::from_safe_string(self.body_html(content)),
            excerpt: content.excerpt.clone().unwrap_or_default(),
            meta_description: content.meta_description.clone().unwrap_or_default(),
            meta_keywords: content.meta_keywords.clone().unwrap_or_default(),
            slug: content.slug.clone(),
            published_at: format_published(content.published_at),
            header: self.fragment(TemplateType::Header, header.as_ref())?,
            footer: self.fragment(TemplateType::Footer, footer.as_ref())?,
            year: OffsetDateTime::now_utc().year(),
        });

        let html = self.execute(&page, &context)?;
        histogram!(METRIC_RENDER_MS, "kind" => "page")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(html)
    }

    /// Render a listing with the active `article_loop` template. An empty
    /// slice renders an empty listing.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn render_post_list(&self, items: &[ContentRecord]) -> Result<String, RenderError> {
        let started = Instant::now();

        let header = self.templates.find_active_by_type(TemplateType::Header).await?;
        let footer = self.templates.find_active_by_type(TemplateType::Footer).await?;
        let listing = self.require_active(TemplateType::ArticleLoop).await?;

        let items = items
            .iter()
            .map(|item| ListItem {
                title: item.title.clone(),
                slug: item.slug.clone(),
                excerpt: item.excerpt.clone().unwrap_or_default(),
                published_at: format_published(item.published_at),
            })
            .collect();

        let context = RenderContext::List(ListContext {
            title: self.site_name.clone(),
            items,
            header: self.fragment(TemplateType::Header, header.as_ref())?,
            footer: self.fragment(TemplateType::Footer, footer.as_ref())?,
            year: OffsetDateTime::now_utc().year(),
        });

        let html = self.execute(&listing, &context)?;
        histogram!(METRIC_RENDER_MS, "kind" => "list")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(html)
    }

    /// Compile only. Used to reject malformed markup before it is saved.
    pub fn validate_template(&self, source: &str) -> Result<(), RenderError> {
        self.compiler.compile(source).map(|_| ())
    }

    /// Compile and execute markup that has no stored identity (previews).
    pub fn validate_and_render(
        &self,
        source: &str,
        context: &RenderContext,
    ) -> Result<String, RenderError> {
        let started = Instant::now();
        let html = self.compiler.compile(source)?.render(context)?;
        histogram!(METRIC_RENDER_MS, "kind" => "preview")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(html)
    }

    async fn require_active(
        &self,
        template_type: TemplateType,
    ) -> Result<TemplateRecord, RenderError> {
        self.templates
            .find_active_by_type(template_type)
            .await?
            .ok_or(RenderError::NoActiveTemplate { template_type })
    }

    /// Fragments see no page data. A missing one renders as nothing.
    fn fragment(
        &self,
        template_type: TemplateType,
        template: Option<&TemplateRecord>,
    ) -> Result<Value, RenderError> {
        let Some(template) = template else {
            warn!(
                template_type = %template_type,
                "No active fragment template; rendering without it"
            );
            return Ok(Value::from_safe_string(String::new()));
        };

        let html = self.execute(template, &RenderContext::empty())?;
        Ok(Value::from_safe_string(html))
    }

    fn execute(
        &self,
        template: &TemplateRecord,
        context: &RenderContext,
    ) -> Result<String, RenderError> {
        let compiled = self.compiled(template)?;
        compiled.render(context).inspect_err(|err| {
            warn!(
                template_id = %template.id,
                version = template.version,
                error = %err,
                "Template execution failed"
            );
        })
    }

    fn compiled(&self, template: &TemplateRecord) -> Result<Arc<CompiledTemplate>, RenderError> {
        if let Some(hit) = self.cache.get(template.id, template.version) {
            return Ok(hit);
        }

        let started = Instant::now();
        let compiled = self.compiler.compile(&template.source).inspect_err(|err| {
            warn!(
                template_id = %template.id,
                version = template.version,
                error = %err,
                "Stored template failed to compile"
            );
        })?;
        histogram!(METRIC_COMPILE_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let compiled = Arc::new(compiled);
        self.cache.put(template.id, template.version, Arc::clone(&compiled));
        debug!(
            cache = "l1",
            outcome = "miss",
            template_id = %template.id,
            version = template.version,
            "Compiled template"
        );
        Ok(compiled)
    }

    fn body_html(&self, content: &ContentRecord) -> String {
        match content.body_format {
            BodyFormat::Html => content.body.clone(),
            BodyFormat::Markdown => match self.markdown.to_html(&content.body) {
                Ok(html) => html,
                Err(err) => {
                    warn!(
                        slug = %content.slug,
                        error = %err,
                        "Markdown conversion failed; serving raw body"
                    );
                    content.body.clone()
                }
            },
        }
    }
}

fn format_published(published_at: Option<OffsetDateTime>) -> String {
    published_at
        .and_then(|at| at.format(PUBLISHED_AT_FORMAT).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::application::render::markdown::{ComrakMarkdown, MarkdownError};
    use crate::application::repos::{ContentStore, CreateContentParams, CreateTemplateParams};
    use crate::domain::types::{ContentStatus, ContentType};
    use crate::infra::memory::MemoryRepositories;

    struct Harness {
        repos: Arc<MemoryRepositories>,
        cache: Arc<TemplateCache>,
        pipeline: RenderPipeline,
    }

    fn harness() -> Harness {
        harness_with(Arc::new(ComrakMarkdown::new()))
    }

    fn harness_with(markdown: Arc<dyn MarkdownConverter>) -> Harness {
        let repos = Arc::new(MemoryRepositories::new());
        let cache = Arc::new(TemplateCache::default());
        let pipeline = RenderPipeline::new(repos.clone(), cache.clone(), markdown, "Vellum");
        Harness {
            repos,
            cache,
            pipeline,
        }
    }

    async fn activate(
        repos: &MemoryRepositories,
        template_type: TemplateType,
        source: &str,
    ) -> TemplateRecord {
        let created = repos
            .create_template(CreateTemplateParams {
                template_type,
                name: template_type.to_string(),
                source: source.to_string(),
            })
            .await
            .unwrap();
        repos.activate_template(created.id).await.unwrap()
    }

    async fn content(
        repos: &MemoryRepositories,
        slug: &str,
        body: &str,
        format: BodyFormat,
    ) -> ContentRecord {
        repos
            .create_content(CreateContentParams {
                slug: slug.to_string(),
                content_type: ContentType::Post,
                title: format!("Title of {slug}"),
                body: body.to_string(),
                body_format: format,
                excerpt: Some("short".to_string()),
                meta_description: None,
                meta_keywords: None,
                status: ContentStatus::Published,
                published_at: Some(datetime!(2024-03-05 10:00 UTC)),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn renders_without_header_or_footer() {
        let h = harness();
        activate(&h.repos, TemplateType::Page, "[{{ header }}]{{ title }}[{{ footer }}]").await;
        let item = content(&h.repos, "hello", "<p>hi</p>", BodyFormat::Html).await;

        let html = h.pipeline.render_page(&item).await.unwrap();
        assert_eq!(html, "[]Title of hello[]");
    }

    #[tokio::test]
    async fn missing_page_template_is_fatal() {
        let h = harness();
        activate(&h.repos, TemplateType::Header, "<header>H</header>").await;
        let item = content(&h.repos, "hello", "<p>hi</p>", BodyFormat::Html).await;

        let err = h.pipeline.render_page(&item).await.unwrap_err();
        assert!(matches!(
            err,
            RenderError::NoActiveTemplate {
                template_type: TemplateType::Page
            }
        ));
        assert_eq!(err.to_string(), "no active page template");
    }

    #[tokio::test]
    async fn page_context_carries_content_fields() {
        let h = harness();
        activate(
            &h.repos,
            TemplateType::Page,
            "{{ site_name }}|{{ slug }}|{{ excerpt }}|{{ published_at }}|{{ body }}",
        )
        .await;
        let item = content(&h.repos, "hello", "<p>hi</p>", BodyFormat::Html).await;

        let html = h.pipeline.render_page(&item).await.unwrap();
        assert_eq!(html, "Vellum|hello|short|March 5, 2024|<p>hi</p>");
    }

    #[tokio::test]
    async fn fragments_do_not_see_page_data() {
        let h = harness();
        activate(&h.repos, TemplateType::Header, "<header>{{ title }}</header>").await;
        activate(&h.repos, TemplateType::Page, "{{ header }}").await;
        let item = content(&h.repos, "hello", "x", BodyFormat::Html).await;

        let html = h.pipeline.render_page(&item).await.unwrap();
        assert_eq!(html, "<header></header>");
    }

    #[tokio::test]
    async fn markdown_body_is_converted() {
        let h = harness();
        activate(&h.repos, TemplateType::Page, "{{ body }}").await;
        let item = content(&h.repos, "md", "*hi*", BodyFormat::Markdown).await;

        let html = h.pipeline.render_page(&item).await.unwrap();
        assert!(html.contains("<em>hi</em>"), "{html}");
    }

    struct BrokenMarkdown;

    impl MarkdownConverter for BrokenMarkdown {
        fn to_html(&self, _source: &str) -> Result<String, MarkdownError> {
            Err(MarkdownError::Conversion {
                message: "unterminated block".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn markdown_failure_falls_back_to_raw_body() {
        let h = harness_with(Arc::new(BrokenMarkdown));
        activate(&h.repos, TemplateType::Page, "{{ body }}").await;
        let item = content(&h.repos, "md", "```never closed", BodyFormat::Markdown).await;

        let html = h.pipeline.render_page(&item).await.unwrap();
        assert_eq!(html, "```never closed");
    }

    #[tokio::test]
    async fn renders_empty_listing() {
        let h = harness();
        activate(
            &h.repos,
            TemplateType::ArticleLoop,
            "<ul>{% for item in items %}<li>{{ item.title }}</li>{% endfor %}</ul>",
        )
        .await;

        assert_eq!(h.pipeline.render_post_list(&[]).await.unwrap(), "<ul></ul>");
    }

    #[tokio::test]
    async fn listing_without_template_is_fatal() {
        let h = harness();
        let err = h.pipeline.render_post_list(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            RenderError::NoActiveTemplate {
                template_type: TemplateType::ArticleLoop
            }
        ));
    }

    #[tokio::test]
    async fn compiled_templates_are_reused_by_version() {
        let h = harness();
        let page = activate(&h.repos, TemplateType::Page, "{{ title }}").await;
        let item = content(&h.repos, "hello", "x", BodyFormat::Html).await;

        h.pipeline.render_page(&item).await.unwrap();
        assert!(h.cache.get(page.id, page.version).is_some());
        assert_eq!(h.cache.len(), 1);

        h.pipeline.render_page(&item).await.unwrap();
        assert_eq!(h.cache.len(), 1);
    }

    #[test]
    fn ad_hoc_renders_do_not_touch_the_cache() {
        let h = harness();
        let first = h
            .pipeline
            .validate_and_render("A{{ n }}", &RenderContext::from_json(json!({"n": 1})))
            .unwrap();
        let second = h
            .pipeline
            .validate_and_render("B{{ n }}", &RenderContext::from_json(json!({"n": 2})))
            .unwrap();

        assert_eq!(first, "A1");
        assert_eq!(second, "B2");
        assert!(h.cache.is_empty());
    }

    #[test]
    fn validate_template_reports_syntax_errors() {
        let h = harness();
        assert!(h.pipeline.validate_template("<p>{{ title }}</p>").is_ok());
        let err = h.pipeline.validate_template("{% for %}").unwrap_err();
        assert!(matches!(err, RenderError::Syntax { .. }));
    }
}
