//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{ContentRecord, InvalidationLogRecord, TemplateRecord};
use crate::domain::types::{
    BodyFormat, ContentStatus, ContentType, EntityKind, MutationAction, TemplateType,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateTemplateParams {
    pub template_type: TemplateType,
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct UpdateTemplateParams {
    pub id: Uuid,
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct CreateContentParams {
    pub slug: String,
    pub content_type: ContentType,
    pub title: String,
    pub body: String,
    pub body_format: BodyFormat,
    pub excerpt: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub status: ContentStatus,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdateContentParams {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub body_format: BodyFormat,
    pub excerpt: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub status: ContentStatus,
    pub published_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_active_by_type(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<TemplateRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TemplateRecord>, RepoError>;

    async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
    ) -> Result<Vec<TemplateRecord>, RepoError>;

    /// Templates are created inactive at version 1.
    async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError>;

    /// Increments `version` when the markup changes.
    async fn update_template(
        &self,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError>;

    /// Marks `id` active and deactivates every sibling of the same type.
    async fn activate_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError>;

    /// Fails with `RepoError::Integrity` while the template is active.
    async fn delete_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>, RepoError>;

    async fn create_content(&self, params: CreateContentParams)
    -> Result<ContentRecord, RepoError>;

    async fn update_content(&self, params: UpdateContentParams)
    -> Result<ContentRecord, RepoError>;

    async fn delete_content(&self, id: Uuid) -> Result<ContentRecord, RepoError>;

    /// Newest first by publish time. `published_only` hides drafts and archives.
    async fn list_by_type(
        &self,
        content_type: ContentType,
        published_only: bool,
        limit: u32,
    ) -> Result<Vec<ContentRecord>, RepoError>;

    async fn count_by_type(
        &self,
        content_type: ContentType,
        published_only: bool,
    ) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait InvalidationLog: Send + Sync {
    async fn append(&self, record: InvalidationLogRecord) -> Result<(), RepoError>;

    async fn list_recent(&self, limit: u32) -> Result<Vec<InvalidationLogRecord>, RepoError>;
}

impl InvalidationLogRecord {
    pub fn new(entity_kind: EntityKind, entity_id: Option<String>, action: MutationAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_kind,
            entity_id,
            action,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
