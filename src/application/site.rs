//! Public page delivery: the rendered-page cache in front of the pipeline.

use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;

use crate::application::error::HttpError;
use crate::application::render::RenderPipeline;
use crate::application::repos::{ContentStore, RepoError};
use crate::cache::{PageCache, PageKey};
use crate::domain::slug::validate_slug;
use crate::domain::types::ContentType;

const SOURCE: &str = "application::site::SiteService";

/// Whether a page came out of the page cache or was rendered for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    Cache,
    Rendered,
}

impl PageOrigin {
    pub fn as_header_value(self) -> &'static str {
        match self {
            PageOrigin::Cache => "hit",
            PageOrigin::Rendered => "miss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServedPage {
    pub body: Bytes,
    pub origin: PageOrigin,
}

#[derive(Clone)]
pub struct SiteService {
    contents: Arc<dyn ContentStore>,
    pipeline: Arc<RenderPipeline>,
    pages: Arc<PageCache>,
    homepage_size: u32,
}

impl SiteService {
    pub fn new(
        contents: Arc<dyn ContentStore>,
        pipeline: Arc<RenderPipeline>,
        pages: Arc<PageCache>,
        homepage_size: u32,
    ) -> Self {
        Self {
            contents,
            pipeline,
            pages,
            homepage_size,
        }
    }

    /// A published content item by slug. `Ok(None)` means 404.
    pub async fn page_by_slug(&self, slug: &str) -> Result<Option<ServedPage>, HttpError> {
        if slug.is_empty() {
            return self.homepage().await.map(Some);
        }
        if validate_slug(slug).is_err() {
            return Ok(None);
        }

        let key = PageKey::for_slug(slug);
        if let Some(body) = self.pages.get(&key).await {
            return Ok(Some(ServedPage {
                body,
                origin: PageOrigin::Cache,
            }));
        }

        // Taken before reading the store so a concurrent invalidation voids this fill.
        let generation = self.pages.generation();

        let record = self
            .contents
            .find_by_slug(slug)
            .await
            .map_err(|err| repo_failure("find_by_slug", err))?;
        let Some(record) = record.filter(|record| record.is_published()) else {
            return Ok(None);
        };

        let html = self.pipeline.render_page(&record).await?;
        let body = Bytes::from(html);
        self.pages
            .put_if_current(&key, body.clone(), self.pages.default_ttl(), generation)
            .await;

        Ok(Some(ServedPage {
            body,
            origin: PageOrigin::Rendered,
        }))
    }

    /// The newest published posts rendered as a listing.
    pub async fn homepage(&self) -> Result<ServedPage, HttpError> {
        let key = PageKey::Homepage;
        if let Some(body) = self.pages.get(&key).await {
            return Ok(ServedPage {
                body,
                origin: PageOrigin::Cache,
            });
        }

        let generation = self.pages.generation();

        let items = self
            .contents
            .list_by_type(ContentType::Post, true, self.homepage_size)
            .await
            .map_err(|err| repo_failure("list_by_type", err))?;

        let html = self.pipeline.render_post_list(&items).await?;
        let body = Bytes::from(html);
        self.pages
            .put_if_current(&key, body.clone(), self.pages.default_ttl(), generation)
            .await;

        Ok(ServedPage {
            body,
            origin: PageOrigin::Rendered,
        })
    }
}

fn repo_failure(operation: &'static str, err: RepoError) -> HttpError {
    HttpError::new(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to load page content",
        format!("{operation} failed: {err}"),
    )
}
