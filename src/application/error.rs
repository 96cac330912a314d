use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::{render::RenderError, repos::RepoError},
    domain::{error::DomainError, slug::SlugError},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text error for the public site. The detail goes to the log only.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RenderError> for HttpError {
    fn from(error: RenderError) -> Self {
        HttpError::from_error(
            "infra::http::render_error_to_http_error",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &error,
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<SlugError> for AppError {
    fn from(error: SlugError) -> Self {
        AppError::Validation(error.to_string())
    }
}

/// JSON body returned by the admin API.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub kind: &'static str,
    /// Only present for errors the caller can act on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Repo(RepoError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Repo(RepoError::Duplicate { .. } | RepoError::Integrity { .. }) => {
                StatusCode::CONFLICT
            }
            AppError::Render(RenderError::Syntax { .. } | RenderError::Execution { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Render(RenderError::NoActiveTemplate { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Repo(RepoError::Persistence(_) | RepoError::Timeout)
            | AppError::Render(RenderError::Repo(_))
            | AppError::Infra(InfraError::Database(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Repo(RepoError::NotFound) => "not_found",
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => "validation",
            AppError::Repo(RepoError::Duplicate { .. } | RepoError::Integrity { .. }) => {
                "conflict"
            }
            AppError::Render(RenderError::Syntax { .. }) => "template_syntax",
            AppError::Render(RenderError::Execution { .. }) => "template_execution",
            AppError::Render(RenderError::NoActiveTemplate { .. }) => "no_active_template",
            AppError::Repo(_) | AppError::Render(RenderError::Repo(_)) => "unavailable",
            AppError::Infra(_) | AppError::Unexpected(_) => "internal",
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "Resource not found",
            StatusCode::BAD_REQUEST => "Request could not be processed",
            StatusCode::CONFLICT => "Request conflicts with current state",
            StatusCode::UNPROCESSABLE_ENTITY => "Template is invalid",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            _ => "Unexpected error occurred",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let status = self.status_code();
        let line = match self {
            AppError::Render(RenderError::Syntax { line, .. }) => *line,
            _ => None,
        };
        ErrorBody {
            error: self.presentation_message(),
            kind: self.kind(),
            message: status.is_client_error().then(|| self.to_string()),
            line,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(self.body())).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TemplateType;

    #[test]
    fn syntax_errors_are_unprocessable_with_line() {
        let err = AppError::from(RenderError::Syntax {
            message: "syntax error: unexpected end of input".to_string(),
            line: Some(3),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = err.body();
        assert_eq!(body.kind, "template_syntax");
        assert_eq!(body.line, Some(3));
        assert!(body.message.is_some());
    }

    #[test]
    fn server_errors_hide_detail() {
        let err = AppError::from(RenderError::NoActiveTemplate {
            template_type: TemplateType::Page,
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body().message.is_none());
    }

    #[test]
    fn active_template_delete_is_a_conflict() {
        let err = AppError::from(RepoError::Integrity {
            message: "active templates cannot be deleted".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn report_collects_error_chain() {
        let err = AppError::from(RenderError::Repo(RepoError::Timeout));
        let report = ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &err);
        assert_eq!(report.messages[0], "template lookup failed: database timeout");
        assert!(report.messages.len() >= 2);
    }
}
