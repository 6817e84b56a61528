use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": "Failed to create receipt",
    "details": "connection refused",
    "request_id": "req-abc123xyz"
}))]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error description
    pub error: String,
    /// Underlying cause, present for dependency failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The error type shared by services and handlers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    ValidationError(String),

    /// A unique or referential constraint rejected the write.
    #[error("{error}")]
    Conflict {
        error: String,
        details: Option<String>,
    },

    #[error("{0}")]
    NotFound(String),

    /// A store, blob or mail backend failed.
    #[error("{error}: {details}")]
    Dependency { error: String, details: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Anything unclassified. The message is logged, never returned.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn dependency(error: impl Into<String>, details: impl Display) -> Self {
        ServiceError::Dependency {
            error: error.into(),
            details: details.to_string(),
        }
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        ServiceError::Conflict {
            error: error.into(),
            details: None,
        }
    }

    /// Maps a store failure for the given step. A unique violation becomes a
    /// conflict reported as `conflict`, with the store's own text in `details`;
    /// everything else is a dependency failure named after the step.
    pub fn from_store(step: &str, conflict: &str, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(raw) => ServiceError::Conflict {
                error: conflict.to_string(),
                details: Some(raw),
            },
            other => ServiceError::dependency(step, other),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict { .. } => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Dependency { .. } | ServiceError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn response_message(&self) -> String {
        match self {
            ServiceError::ValidationError(msg)
            | ServiceError::Conflict { error: msg, .. }
            | ServiceError::NotFound(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::Forbidden(msg) => msg.clone(),
            ServiceError::Dependency { error, .. } => error.clone(),
            ServiceError::InternalError(_) => "Internal server error".to_string(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ServiceError::Dependency { details, .. } => Some(details.clone()),
            ServiceError::Conflict { details, .. } => details.clone(),
            _ => None,
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::ValidationError(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::ValidationError(format!(
            "Invalid query parameters: {}",
            rejection.body_text()
        ))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ServiceError::InternalError(msg) => {
                tracing::error!(error = %msg, "unclassified failure");
            }
            ServiceError::Dependency { error, details } => {
                tracing::error!(error = %error, details = %details, "dependency failure");
            }
            _ => {}
        }

        let body = ErrorResponse {
            success: false,
            error: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
        };
        (status, Json(body)).into_response()
    }
}
