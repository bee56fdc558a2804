//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::handlers::HandlerError;
use crate::maintenance::MaintenanceError;
use crate::retention::RetentionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Refused by configuration.
    #[error("{0}")]
    Forbidden(String),

    /// The upstream push gateway failed.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<HandlerError> for ApiError {
    fn from(e: HandlerError) -> Self {
        match e {
            HandlerError::Validation(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MaintenanceError> for ApiError {
    fn from(e: MaintenanceError) -> Self {
        match e {
            MaintenanceError::ResetDisabled => Self::Forbidden(e.to_string()),
            MaintenanceError::ConfirmationMismatch { .. } => Self::BadRequest(e.to_string()),
            MaintenanceError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<RetentionError> for ApiError {
    fn from(e: RetentionError) -> Self {
        match e {
            RetentionError::UnknownTarget(_) => Self::NotFound(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<kindred_storage::StorageError> for ApiError {
    fn from(e: kindred_storage::StorageError) -> Self {
        use kindred_storage::ErrorCategory;
        match e.category() {
            ErrorCategory::NotFound => Self::NotFound(e.to_string()),
            ErrorCategory::Conflict => Self::Conflict(e.to_string()),
            ErrorCategory::Validation => Self::BadRequest(e.to_string()),
            _ => Self::Internal(e.to_string()),
        }
    }
}

impl From<kindred_core::CoreError> for ApiError {
    fn from(e: kindred_core::CoreError) -> Self {
        Self::BadRequest(e.to_string())
    }
}
