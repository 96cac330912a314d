use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{InvalidationLog, RepoError},
    domain::{
        entities::InvalidationLogRecord,
        types::{EntityKind, MutationAction},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct InvalidationRow {
    id: Uuid,
    entity_kind: EntityKind,
    entity_id: Option<String>,
    action: MutationAction,
    created_at: OffsetDateTime,
}

impl From<InvalidationRow> for InvalidationLogRecord {
    fn from(row: InvalidationRow) -> Self {
        Self {
            id: row.id,
            entity_kind: row.entity_kind,
            entity_id: row.entity_id,
            action: row.action,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl InvalidationLog for PostgresRepositories {
    async fn append(&self, record: InvalidationLogRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO invalidation_logs (id, entity_kind, entity_id, action, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.entity_kind)
        .bind(record.entity_id)
        .bind(record.action)
        .bind(record.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<InvalidationLogRecord>, RepoError> {
        let rows = sqlx::query_as::<_, InvalidationRow>(
            "SELECT id, entity_kind, entity_id, action, created_at \
             FROM invalidation_logs \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(InvalidationLogRecord::from).collect())
    }
}
