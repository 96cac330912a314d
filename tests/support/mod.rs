#![allow(dead_code)]

use std::sync::Arc;

use time::OffsetDateTime;
use vellum::application::admin::{ContentCommand, CreateTemplateCommand};
use vellum::cache::{CacheConfig, MemoryPageBackend, PageCacheBackend};
use vellum::config::SiteSettings;
use vellum::domain::entities::{ContentRecord, TemplateRecord};
use vellum::domain::types::{BodyFormat, ContentStatus, ContentType, TemplateType};
use vellum::infra::app::{Application, Stores};
use vellum::infra::memory::MemoryRepositories;

pub struct TestApp {
    pub app: Application,
    pub repos: Arc<MemoryRepositories>,
}

pub fn test_app() -> TestApp {
    test_app_with(Arc::new(MemoryPageBackend::new(&CacheConfig::default())))
}

pub fn test_app_with(backend: Arc<dyn PageCacheBackend>) -> TestApp {
    let repos = Arc::new(MemoryRepositories::new());
    let site = SiteSettings {
        site_name: "Vellum".to_string(),
        homepage_size: 10,
    };
    let app = Application::assemble(
        Stores::memory(repos.clone()),
        backend,
        &CacheConfig::default(),
        &site,
    );
    TestApp { app, repos }
}

/// Create a template and make it the active one of its type.
pub async fn install_template(
    app: &Application,
    template_type: TemplateType,
    source: &str,
) -> TemplateRecord {
    let templates = &app.admin_state.templates;
    let created = templates
        .create(CreateTemplateCommand {
            template_type,
            name: format!("{template_type} template"),
            source: source.to_string(),
        })
        .await
        .expect("template should be created");
    templates
        .activate(created.record.id)
        .await
        .expect("template should activate")
        .record
}

pub fn content_command(slug: &str, title: &str, body: &str, format: BodyFormat) -> ContentCommand {
    ContentCommand {
        slug: Some(slug.to_string()),
        content_type: ContentType::Post,
        title: title.to_string(),
        body: body.to_string(),
        body_format: format,
        excerpt: None,
        meta_description: None,
        meta_keywords: None,
        status: ContentStatus::Published,
        published_at: Some(OffsetDateTime::now_utc()),
    }
}

pub async fn publish(
    app: &Application,
    slug: &str,
    title: &str,
    body: &str,
    format: BodyFormat,
) -> ContentRecord {
    app.admin_state
        .contents
        .create(content_command(slug, title, body, format))
        .await
        .expect("content should be created")
        .record
}

/// Header, footer, page, and listing templates with fixed markup.
pub async fn install_site(app: &Application) {
    install_template(app, TemplateType::Header, "<header>H</header>").await;
    install_template(app, TemplateType::Footer, "<footer>F</footer>").await;
    install_template(
        app,
        TemplateType::Page,
        "{{ header }}<h1>{{ title }}</h1>{{ body }}{{ footer }}",
    )
    .await;
    install_template(
        app,
        TemplateType::ArticleLoop,
        "{{ header }}<ul>{% for item in items %}<li>{{ item.title }}</li>{% endfor %}</ul>{{ footer }}",
    )
    .await;
}
