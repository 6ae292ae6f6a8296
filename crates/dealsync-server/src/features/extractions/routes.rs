//! Extraction API routes
//!
//! # Route Structure
//!
//! - `POST /extractions` - Start an extraction
//! - `GET /extractions` - List scans, newest first
//! - `GET /extractions/:scan_id/status` - Scan status and live progress
//! - `GET /extractions/:scan_id/results` - Rows written by a completed scan
//! - `POST /credentials/validate` - Check a HubSpot token

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::{
        start, validate_credentials, StartExtractionCommand, StartExtractionError,
        ValidateCredentialsCommand, ValidateCredentialsError,
    },
    queries::{get_results, get_status, list, GetScanResultsQuery, GetScanStatusQuery, ListScansQuery},
};
use crate::error::AppError;
use crate::features::shared::PageWindow;
use crate::ingest::JobTracker;

pub fn extractions_routes() -> Router<JobTracker> {
    Router::new()
        .route("/", post(start_extraction).get(list_scans))
        .route("/:scan_id/status", get(get_scan_status))
        .route("/:scan_id/results", get(get_scan_results))
}

pub fn credentials_routes() -> Router<JobTracker> {
    Router::new().route("/validate", post(validate_token))
}

impl From<StartExtractionError> for AppError {
    fn from(err: StartExtractionError) -> Self {
        match err {
            StartExtractionError::Validation(message) => AppError::BadRequest(message),
            StartExtractionError::Job(e) => e.into(),
        }
    }
}

impl From<ValidateCredentialsError> for AppError {
    fn from(err: ValidateCredentialsError) -> Self {
        match err {
            ValidateCredentialsError::MissingToken => AppError::BadRequest(err.to_string()),
            ValidateCredentialsError::Job(e) => e.into(),
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

// ============================================================================
// Command Handlers
// ============================================================================

/// `POST /extractions`
async fn start_extraction(
    State(tracker): State<JobTracker>,
    payload: Result<Json<StartExtractionCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let command = body(payload)?;
    let response = start::handle(&tracker, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// `POST /credentials/validate`
async fn validate_token(
    State(tracker): State<JobTracker>,
    payload: Result<Json<ValidateCredentialsCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let command = body(payload)?;
    let response = validate_credentials::handle(&tracker, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

// ============================================================================
// Query Handlers
// ============================================================================

/// `GET /extractions?status=running`
async fn list_scans(
    State(tracker): State<JobTracker>,
    Query(query): Query<ListScansQuery>,
) -> Result<Response, AppError> {
    let response = list::handle(&tracker, query).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// `GET /extractions/:scan_id/status`
async fn get_scan_status(
    State(tracker): State<JobTracker>,
    Path(scan_id): Path<String>,
) -> Result<Response, AppError> {
    let response = get_status::handle(&tracker, GetScanStatusQuery { scan_id }).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// `GET /extractions/:scan_id/results?limit=100&offset=0`
async fn get_scan_results(
    State(tracker): State<JobTracker>,
    Path(scan_id): Path<String>,
    Query(window): Query<PageWindow>,
) -> Result<Response, AppError> {
    let response = get_results::handle(&tracker, GetScanResultsQuery { scan_id, window }).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _extractions = extractions_routes();
        let _credentials = credentials_routes();
    }
}
