//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dealsync_common::DealsyncError;
use serde_json::json;
use thiserror::Error;

use crate::ingest::hubspot::HubSpotError;
use crate::ingest::JobError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                message.clone()
            },
            AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::BadRequest(message)
            | AppError::Unauthorized(message)
            | AppError::Forbidden(message) => message,
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<HubSpotError> for AppError {
    fn from(err: HubSpotError) -> Self {
        match err {
            HubSpotError::AuthenticationFailed => AppError::Unauthorized(err.to_string()),
            HubSpotError::AuthorizationFailed => AppError::Forbidden(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(_) => AppError::NotFound(err.to_string()),
            JobError::InvalidState(message) => AppError::Conflict(message),
            JobError::Api(e) => e.into(),
            JobError::Storage(e) => {
                tracing::error!("Warehouse error: {:?}", e);
                AppError::Internal("A database error occurred".to_string())
            },
        }
    }
}

impl From<DealsyncError> for AppError {
    fn from(err: DealsyncError) -> Self {
        match err {
            DealsyncError::InvalidIdentifier(message) => AppError::BadRequest(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}
