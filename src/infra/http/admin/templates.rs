use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::admin::{CreateTemplateCommand, UpdateTemplateCommand};
use crate::application::error::AppError;
use crate::domain::types::TemplateType;

use super::AdminState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct TemplateListQuery {
    #[serde(rename = "type")]
    template_type: Option<TemplateType>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SourcePayload {
    source: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PreviewPayload {
    source: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub(super) async fn list_templates(
    State(state): State<AdminState>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Response, AppError> {
    let records = state.templates.list(query.template_type).await?;
    Ok(Json(records).into_response())
}

pub(super) async fn get_template(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = state.templates.get(id).await?;
    Ok(Json(record).into_response())
}

pub(super) async fn create_template(
    State(state): State<AdminState>,
    Json(command): Json<CreateTemplateCommand>,
) -> Result<Response, AppError> {
    let mutated = state.templates.create(command).await?;
    Ok((StatusCode::CREATED, Json(mutated)).into_response())
}

pub(super) async fn update_template(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<UpdateTemplateCommand>,
) -> Result<Response, AppError> {
    let mutated = state.templates.update(id, command).await?;
    Ok(Json(mutated).into_response())
}

pub(super) async fn activate_template(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let mutated = state.templates.activate(id).await?;
    Ok(Json(mutated).into_response())
}

pub(super) async fn delete_template(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let mutated = state.templates.delete(id).await?;
    Ok(Json(mutated).into_response())
}

/// 204 when the markup compiles, 422 with the failing line otherwise.
pub(super) async fn validate_template(
    State(state): State<AdminState>,
    Json(payload): Json<SourcePayload>,
) -> Result<Response, AppError> {
    state.templates.validate(&payload.source)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(super) async fn preview_template(
    State(state): State<AdminState>,
    Json(payload): Json<PreviewPayload>,
) -> Result<Response, AppError> {
    let html = state.templates.preview(&payload.source, payload.data)?;
    let mut response = (StatusCode::OK, html).into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    Ok(response)
}
