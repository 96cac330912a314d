use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::error::AppError;

use super::AdminState;

const DEFAULT_AUDIT_LIMIT: u32 = 50;
const MAX_AUDIT_LIMIT: u32 = 500;

/// Drops every compiled template and every rendered page.
pub(super) async fn purge_cache(State(state): State<AdminState>) -> Response {
    let report = state.coordinator.purge_all().await;
    Json(report).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AuditQuery {
    limit: Option<u32>,
}

pub(super) async fn list_invalidations(
    State(state): State<AdminState>,
    Query(query): Query<AuditQuery>,
) -> Result<Response, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let records = state.invalidations.list_recent(limit).await?;
    Ok(Json(records).into_response())
}
