use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ContentStore, CreateContentParams, RepoError, UpdateContentParams},
    domain::{
        entities::ContentRecord,
        types::{BodyFormat, ContentStatus, ContentType},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const CONTENT_COLUMNS: &str = "id, slug, content_type, title, body, body_format, excerpt, \
     meta_description, meta_keywords, status, published_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    slug: String,
    content_type: ContentType,
    title: String,
    body: String,
    body_format: BodyFormat,
    excerpt: Option<String>,
    meta_description: Option<String>,
    meta_keywords: Option<String>,
    status: ContentStatus,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ContentRow> for ContentRecord {
    fn from(row: ContentRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            content_type: row.content_type,
            title: row.title,
            body: row.body,
            body_format: row.body_format,
            excerpt: row.excerpt,
            meta_description: row.meta_description,
            meta_keywords: row.meta_keywords,
            status: row.status,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    fn push_type_scope<'q>(
        qb: &mut QueryBuilder<'q, Postgres>,
        content_type: ContentType,
        published_only: bool,
    ) {
        qb.push(" WHERE content_type = ");
        qb.push_bind(content_type);
        if published_only {
            qb.push(" AND status = ");
            qb.push_bind(ContentStatus::Published);
        }
    }
}

#[async_trait]
impl ContentStore for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentRecord>, RepoError> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1");
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ContentRecord::from))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>, RepoError> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE slug = $1");
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ContentRecord::from))
    }

    async fn create_content(
        &self,
        params: CreateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO contents (id, slug, content_type, title, body, body_format, excerpt, \
                 meta_description, meta_keywords, status, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {CONTENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.slug)
            .bind(params.content_type)
            .bind(params.title)
            .bind(params.body)
            .bind(params.body_format)
            .bind(params.excerpt)
            .bind(params.meta_description)
            .bind(params.meta_keywords)
            .bind(params.status)
            .bind(params.published_at)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ContentRecord::from(row))
    }

    async fn update_content(
        &self,
        params: UpdateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let sql = format!(
            "UPDATE contents SET slug = $2, title = $3, body = $4, body_format = $5, \
                 excerpt = $6, meta_description = $7, meta_keywords = $8, status = $9, \
                 published_at = $10, updated_at = now() \
             WHERE id = $1 \
             RETURNING {CONTENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(params.id)
            .bind(params.slug)
            .bind(params.title)
            .bind(params.body)
            .bind(params.body_format)
            .bind(params.excerpt)
            .bind(params.meta_description)
            .bind(params.meta_keywords)
            .bind(params.status)
            .bind(params.published_at)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ContentRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_content(&self, id: Uuid) -> Result<ContentRecord, RepoError> {
        let sql = format!("DELETE FROM contents WHERE id = $1 RETURNING {CONTENT_COLUMNS}");
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ContentRecord::from).ok_or(RepoError::NotFound)
    }

    async fn list_by_type(
        &self,
        content_type: ContentType,
        published_only: bool,
        limit: u32,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {CONTENT_COLUMNS} FROM contents"));
        Self::push_type_scope(&mut qb, content_type, published_only);
        qb.push(" ORDER BY COALESCE(published_at, created_at) DESC, created_at DESC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<ContentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }

    async fn count_by_type(
        &self,
        content_type: ContentType,
        published_only: bool,
    ) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM contents");
        Self::push_type_scope(&mut qb, content_type, published_only);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
