use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateTemplateParams, RepoError, TemplateStore, UpdateTemplateParams},
    domain::{entities::TemplateRecord, types::TemplateType},
};

use super::{PostgresRepositories, map_sqlx_error};

const TEMPLATE_COLUMNS: &str =
    "id, template_type, name, source, version, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    template_type: TemplateType,
    name: String,
    source: String,
    version: i64,
    is_active: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TemplateRow> for TemplateRecord {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            template_type: row.template_type,
            name: row.name,
            source: row.source,
            version: row.version,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl TemplateStore for PostgresRepositories {
    async fn find_active_by_type(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<TemplateRecord>, RepoError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE template_type = $1 AND is_active"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(template_type)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(TemplateRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TemplateRecord>, RepoError> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1");
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(TemplateRecord::from))
    }

    async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
    ) -> Result<Vec<TemplateRecord>, RepoError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates \
             WHERE ($1::template_type IS NULL OR template_type = $1) \
             ORDER BY template_type, name, created_at"
        );
        let rows = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(template_type)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TemplateRecord::from).collect())
    }

    async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let sql = format!(
            "INSERT INTO templates (id, template_type, name, source, version, is_active) \
             VALUES ($1, $2, $3, $4, 1, FALSE) \
             RETURNING {TEMPLATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.template_type)
            .bind(params.name)
            .bind(params.source)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(TemplateRecord::from(row))
    }

    async fn update_template(
        &self,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let sql = format!(
            "UPDATE templates SET \
                 name = $2, \
                 version = CASE WHEN source IS DISTINCT FROM $3 THEN version + 1 ELSE version END, \
                 source = $3, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {TEMPLATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(params.id)
            .bind(params.name)
            .bind(params.source)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(TemplateRecord::from).ok_or(RepoError::NotFound)
    }

    async fn activate_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let template_type: Option<TemplateType> =
            sqlx::query_scalar("SELECT template_type FROM templates WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let template_type = template_type.ok_or(RepoError::NotFound)?;

        sqlx::query(
            "UPDATE templates SET is_active = FALSE, updated_at = now() \
             WHERE template_type = $1 AND is_active AND id <> $2",
        )
        .bind(template_type)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let sql = format!(
            "UPDATE templates SET is_active = TRUE, updated_at = now() \
             WHERE id = $1 \
             RETURNING {TEMPLATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(TemplateRecord::from(row))
    }

    async fn delete_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let is_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM templates WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        match is_active {
            None => return Err(RepoError::NotFound),
            Some(true) => {
                return Err(RepoError::Integrity {
                    message: "active templates cannot be deleted".to_string(),
                });
            }
            Some(false) => {}
        }

        let sql = format!("DELETE FROM templates WHERE id = $1 RETURNING {TEMPLATE_COLUMNS}");
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(TemplateRecord::from(row))
    }
}
