use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::admin::ContentCommand;
use crate::application::error::AppError;
use crate::domain::types::ContentType;

use super::AdminState;

const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub(super) struct ContentListQuery {
    #[serde(rename = "type", default = "default_content_type")]
    content_type: ContentType,
    #[serde(default)]
    limit: Option<u32>,
}

fn default_content_type() -> ContentType {
    ContentType::Post
}

pub(super) async fn list_contents(
    State(state): State<AdminState>,
    Query(query): Query<ContentListQuery>,
) -> Result<Response, AppError> {
    let records = state
        .contents
        .list(
            query.content_type,
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        )
        .await?;
    Ok(Json(records).into_response())
}

pub(super) async fn get_content(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = state.contents.get(id).await?;
    Ok(Json(record).into_response())
}

pub(super) async fn create_content(
    State(state): State<AdminState>,
    Json(command): Json<ContentCommand>,
) -> Result<Response, AppError> {
    let mutated = state.contents.create(command).await?;
    Ok((StatusCode::CREATED, Json(mutated)).into_response())
}

pub(super) async fn update_content(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<ContentCommand>,
) -> Result<Response, AppError> {
    let mutated = state.contents.update(id, command).await?;
    Ok(Json(mutated).into_response())
}

pub(super) async fn delete_content(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let mutated = state.contents.delete(id).await?;
    Ok(Json(mutated).into_response())
}
