//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{
    BodyFormat, ContentStatus, ContentType, EntityKind, MutationAction, TemplateType,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRecord {
    pub id: Uuid,
    pub template_type: TemplateType,
    pub name: String,
    pub source: String,
    /// Bumped by the store on every edit to `source`.
    pub version: i64,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    pub id: Uuid,
    pub slug: String,
    pub content_type: ContentType,
    pub title: String,
    pub body: String,
    pub body_format: BodyFormat,
    pub excerpt: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub status: ContentStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ContentRecord {
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidationLogRecord {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: Option<String>,
    pub action: MutationAction,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
