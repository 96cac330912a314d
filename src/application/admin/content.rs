use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::admin::Mutated;
use crate::application::error::AppError;
use crate::application::repos::{
    ContentStore, CreateContentParams, RepoError, UpdateContentParams,
};
use crate::cache::InvalidationCoordinator;
use crate::domain::entities::ContentRecord;
use crate::domain::slug::{SlugError, derive_slug, validate_slug};
use crate::domain::types::{BodyFormat, ContentStatus, ContentType};

const MAX_LIST_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum AdminContentError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<AdminContentError> for AppError {
    fn from(error: AdminContentError) -> Self {
        match error {
            AdminContentError::ConstraintViolation(message) => AppError::validation(message),
            AdminContentError::Slug(err) => AppError::from(err),
            AdminContentError::Repo(err) => AppError::Repo(err),
        }
    }
}

/// Payload for both create and update. A missing slug is derived from the title.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentCommand {
    #[serde(default)]
    pub slug: Option<String>,
    pub content_type: ContentType,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub body_format: BodyFormat,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Option<String>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

struct NormalizedContent {
    slug: String,
    title: String,
    published_at: Option<OffsetDateTime>,
}

impl ContentCommand {
    fn normalize(&self) -> Result<NormalizedContent, AdminContentError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AdminContentError::ConstraintViolation(
                "title must not be empty",
            ));
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                validate_slug(slug)?;
                slug.to_string()
            }
            _ => derive_slug(title)?,
        };

        // Publishing without a date stamps the current time.
        let published_at = match (self.status, self.published_at) {
            (ContentStatus::Published, None) => Some(OffsetDateTime::now_utc()),
            (_, at) => at,
        };

        Ok(NormalizedContent {
            slug,
            title: title.to_string(),
            published_at,
        })
    }
}

#[derive(Clone)]
pub struct AdminContentService {
    store: Arc<dyn ContentStore>,
    coordinator: Arc<InvalidationCoordinator>,
}

impl AdminContentService {
    pub fn new(store: Arc<dyn ContentStore>, coordinator: Arc<InvalidationCoordinator>) -> Self {
        Self { store, coordinator }
    }

    pub async fn list(
        &self,
        content_type: ContentType,
        limit: u32,
    ) -> Result<Vec<ContentRecord>, AdminContentError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        Ok(self.store.list_by_type(content_type, false, limit).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<ContentRecord, AdminContentError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AdminContentError::Repo(RepoError::NotFound))
    }

    pub async fn create(
        &self,
        command: ContentCommand,
    ) -> Result<Mutated<ContentRecord>, AdminContentError> {
        let normalized = command.normalize()?;

        let record = self
            .store
            .create_content(CreateContentParams {
                slug: normalized.slug,
                content_type: command.content_type,
                title: normalized.title,
                body: command.body,
                body_format: command.body_format,
                excerpt: command.excerpt,
                meta_description: command.meta_description,
                meta_keywords: command.meta_keywords,
                status: command.status,
                published_at: normalized.published_at,
            })
            .await?;

        let invalidation = self
            .coordinator
            .content_created(record.id, &record.slug)
            .await;
        info!(content_id = %record.id, slug = %record.slug, "Content created");
        Ok(Mutated::new(record, invalidation))
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: ContentCommand,
    ) -> Result<Mutated<ContentRecord>, AdminContentError> {
        let existing = self.get(id).await?;
        let normalized = command.normalize()?;

        let record = self
            .store
            .update_content(UpdateContentParams {
                id,
                slug: normalized.slug,
                title: normalized.title,
                body: command.body,
                body_format: command.body_format,
                excerpt: command.excerpt,
                meta_description: command.meta_description,
                meta_keywords: command.meta_keywords,
                status: command.status,
                published_at: normalized.published_at,
            })
            .await?;

        let invalidation = self
            .coordinator
            .content_updated(record.id, &record.slug, Some(&existing.slug))
            .await;
        info!(content_id = %record.id, slug = %record.slug, "Content updated");
        Ok(Mutated::new(record, invalidation))
    }

    pub async fn delete(&self, id: Uuid) -> Result<Mutated<ContentRecord>, AdminContentError> {
        let record = self.store.delete_content(id).await?;

        let invalidation = self
            .coordinator
            .content_deleted(record.id, &record.slug)
            .await;
        info!(content_id = %record.id, slug = %record.slug, "Content deleted");
        Ok(Mutated::new(record, invalidation))
    }
}
