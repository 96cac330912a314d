//! In-memory repository implementations.
//!
//! Same contracts as the Postgres adapters. Used by the test suite and by
//! `vellum serve` when no database URL is configured.

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{
    ContentStore, CreateContentParams, CreateTemplateParams, InvalidationLog, RepoError,
    TemplateStore, UpdateContentParams, UpdateTemplateParams,
};
use crate::domain::entities::{ContentRecord, InvalidationLogRecord, TemplateRecord};
use crate::domain::types::{ContentType, TemplateType};

const CONTENT_SLUG_CONSTRAINT: &str = "contents_slug_key";
/// Audit records kept before the oldest are dropped.
pub const INVALIDATION_LOG_CAPACITY: usize = 4096;

pub struct MemoryRepositories {
    templates: RwLock<HashMap<Uuid, TemplateRecord>>,
    contents: RwLock<HashMap<Uuid, ContentRecord>>,
    invalidations: RwLock<VecDeque<InvalidationLogRecord>>,
    invalidation_capacity: usize,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::with_log_capacity(INVALIDATION_LOG_CAPACITY)
    }
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            templates: RwLock::default(),
            contents: RwLock::default(),
            invalidations: RwLock::new(VecDeque::with_capacity(capacity.min(256))),
            invalidation_capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl TemplateStore for MemoryRepositories {
    async fn find_active_by_type(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<TemplateRecord>, RepoError> {
        let templates = self.templates.read().await;
        Ok(templates
            .values()
            .find(|template| template.template_type == template_type && template.is_active)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TemplateRecord>, RepoError> {
        Ok(self.templates.read().await.get(&id).cloned())
    }

    async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
    ) -> Result<Vec<TemplateRecord>, RepoError> {
        let templates = self.templates.read().await;
        let mut listed: Vec<TemplateRecord> = templates
            .values()
            .filter(|template| template_type.is_none_or(|kind| template.template_type == kind))
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            (a.template_type.as_str(), &a.name, a.created_at).cmp(&(
                b.template_type.as_str(),
                &b.name,
                b.created_at,
            ))
        });
        Ok(listed)
    }

    async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = TemplateRecord {
            id: Uuid::new_v4(),
            template_type: params.template_type,
            name: params.name,
            source: params.source,
            version: 1,
            is_active: false,
            created_at: now,
            updated_at: now,
        };
        self.templates
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_template(
        &self,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let mut templates = self.templates.write().await;
        let record = templates.get_mut(&params.id).ok_or(RepoError::NotFound)?;

        if record.source != params.source {
            record.version += 1;
        }
        record.name = params.name;
        record.source = params.source;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn activate_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        let mut templates = self.templates.write().await;
        let template_type = templates
            .get(&id)
            .map(|record| record.template_type)
            .ok_or(RepoError::NotFound)?;

        let now = OffsetDateTime::now_utc();
        for record in templates.values_mut() {
            if record.template_type != template_type {
                continue;
            }
            let active = record.id == id;
            if record.is_active != active {
                record.is_active = active;
                record.updated_at = now;
            }
        }

        templates.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn delete_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        let mut templates = self.templates.write().await;
        match templates.get(&id) {
            None => Err(RepoError::NotFound),
            Some(record) if record.is_active => Err(RepoError::Integrity {
                message: "active templates cannot be deleted".to_string(),
            }),
            Some(_) => templates.remove(&id).ok_or(RepoError::NotFound),
        }
    }
}

#[async_trait]
impl ContentStore for MemoryRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentRecord>, RepoError> {
        Ok(self.contents.read().await.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>, RepoError> {
        let contents = self.contents.read().await;
        Ok(contents.values().find(|content| content.slug == slug).cloned())
    }

    async fn create_content(
        &self,
        params: CreateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let mut contents = self.contents.write().await;
        if contents.values().any(|content| content.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: CONTENT_SLUG_CONSTRAINT.to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = ContentRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            content_type: params.content_type,
            title: params.title,
            body: params.body,
            body_format: params.body_format,
            excerpt: params.excerpt,
            meta_description: params.meta_description,
            meta_keywords: params.meta_keywords,
            status: params.status,
            published_at: params.published_at,
            created_at: now,
            updated_at: now,
        };
        contents.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_content(
        &self,
        params: UpdateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let mut contents = self.contents.write().await;
        if contents
            .values()
            .any(|content| content.slug == params.slug && content.id != params.id)
        {
            return Err(RepoError::Duplicate {
                constraint: CONTENT_SLUG_CONSTRAINT.to_string(),
            });
        }

        let record = contents.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.slug = params.slug;
        record.title = params.title;
        record.body = params.body;
        record.body_format = params.body_format;
        record.excerpt = params.excerpt;
        record.meta_description = params.meta_description;
        record.meta_keywords = params.meta_keywords;
        record.status = params.status;
        record.published_at = params.published_at;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_content(&self, id: Uuid) -> Result<ContentRecord, RepoError> {
        self.contents
            .write()
            .await
            .remove(&id)
            .ok_or(RepoError::NotFound)
    }

    async fn list_by_type(
        &self,
        content_type: ContentType,
        published_only: bool,
        limit: u32,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let contents = self.contents.read().await;
        let mut listed: Vec<ContentRecord> = contents
            .values()
            .filter(|content| content.content_type == content_type)
            .filter(|content| !published_only || content.is_published())
            .cloned()
            .collect();
        listed.sort_by_key(|content| {
            (
                Reverse(content.published_at.unwrap_or(content.created_at)),
                Reverse(content.created_at),
            )
        });
        listed.truncate(limit as usize);
        Ok(listed)
    }

    async fn count_by_type(
        &self,
        content_type: ContentType,
        published_only: bool,
    ) -> Result<u64, RepoError> {
        let contents = self.contents.read().await;
        let count = contents
            .values()
            .filter(|content| content.content_type == content_type)
            .filter(|content| !published_only || content.is_published())
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl InvalidationLog for MemoryRepositories {
    async fn append(&self, record: InvalidationLogRecord) -> Result<(), RepoError> {
        let mut records = self.invalidations.write().await;
        if records.len() >= self.invalidation_capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<InvalidationLogRecord>, RepoError> {
        let records = self.invalidations.read().await;
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::types::{BodyFormat, ContentStatus, EntityKind, MutationAction};

    fn template(template_type: TemplateType, source: &str) -> CreateTemplateParams {
        CreateTemplateParams {
            template_type,
            name: format!("{template_type} template"),
            source: source.to_string(),
        }
    }

    fn content(
        slug: &str,
        status: ContentStatus,
        published_at: OffsetDateTime,
    ) -> CreateContentParams {
        CreateContentParams {
            slug: slug.to_string(),
            content_type: ContentType::Post,
            title: slug.to_string(),
            body: String::new(),
            body_format: BodyFormat::Html,
            excerpt: None,
            meta_description: None,
            meta_keywords: None,
            status,
            published_at: Some(published_at),
        }
    }

    #[tokio::test]
    async fn update_bumps_version_only_on_markup_change() {
        let repos = MemoryRepositories::new();
        let created = repos
            .create_template(template(TemplateType::Page, "a"))
            .await
            .unwrap();
        assert_eq!(created.version, 1);
        assert!(!created.is_active);

        let renamed = repos
            .update_template(UpdateTemplateParams {
                id: created.id,
                name: "renamed".into(),
                source: "a".into(),
            })
            .await
            .unwrap();
        assert_eq!(renamed.version, 1);

        let edited = repos
            .update_template(UpdateTemplateParams {
                id: created.id,
                name: "renamed".into(),
                source: "b".into(),
            })
            .await
            .unwrap();
        assert_eq!(edited.version, 2);
    }

    #[tokio::test]
    async fn activation_deactivates_siblings_only() {
        let repos = MemoryRepositories::new();
        let first = repos
            .create_template(template(TemplateType::Page, "1"))
            .await
            .unwrap();
        let second = repos
            .create_template(template(TemplateType::Page, "2"))
            .await
            .unwrap();
        let header = repos
            .create_template(template(TemplateType::Header, "h"))
            .await
            .unwrap();

        repos.activate_template(first.id).await.unwrap();
        repos.activate_template(header.id).await.unwrap();
        repos.activate_template(second.id).await.unwrap();

        let active = repos
            .find_active_by_type(TemplateType::Page)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second.id);
        let first = TemplateStore::find_by_id(&repos, first.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!first.is_active);
        assert!(
            repos
                .find_active_by_type(TemplateType::Header)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn active_template_cannot_be_deleted() {
        let repos = MemoryRepositories::new();
        let created = repos
            .create_template(template(TemplateType::Footer, "f"))
            .await
            .unwrap();
        repos.activate_template(created.id).await.unwrap();

        let err = repos.delete_template(created.id).await.unwrap_err();
        assert!(matches!(err, RepoError::Integrity { .. }));
    }

    #[tokio::test]
    async fn slugs_are_unique() {
        let repos = MemoryRepositories::new();
        let at = datetime!(2024-01-01 00:00 UTC);
        repos
            .create_content(content("hello", ContentStatus::Published, at))
            .await
            .unwrap();
        let err = repos
            .create_content(content("hello", ContentStatus::Draft, at))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filters_drafts() {
        let repos = MemoryRepositories::new();
        repos
            .create_content(content(
                "old",
                ContentStatus::Published,
                datetime!(2024-01-01 00:00 UTC),
            ))
            .await
            .unwrap();
        repos
            .create_content(content(
                "new",
                ContentStatus::Published,
                datetime!(2024-06-01 00:00 UTC),
            ))
            .await
            .unwrap();
        repos
            .create_content(content(
                "draft",
                ContentStatus::Draft,
                datetime!(2024-09-01 00:00 UTC),
            ))
            .await
            .unwrap();

        let listed = repos.list_by_type(ContentType::Post, true, 10).await.unwrap();
        let slugs: Vec<&str> = listed.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, ["new", "old"]);

        assert_eq!(repos.count_by_type(ContentType::Post, true).await.unwrap(), 2);
        assert_eq!(repos.count_by_type(ContentType::Post, false).await.unwrap(), 3);
        let limited = repos.list_by_type(ContentType::Post, false, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn invalidation_log_keeps_only_the_newest_records() {
        let repos = MemoryRepositories::with_log_capacity(3);
        for n in 0..5 {
            repos
                .append(InvalidationLogRecord::new(
                    EntityKind::Content,
                    Some(n.to_string()),
                    MutationAction::Updated,
                ))
                .await
                .unwrap();
        }

        let recent = repos.list_recent(10).await.unwrap();
        let ids: Vec<&str> = recent
            .iter()
            .filter_map(|record| record.entity_id.as_deref())
            .collect();
        assert_eq!(ids, ["4", "3", "2"]);
    }
}
