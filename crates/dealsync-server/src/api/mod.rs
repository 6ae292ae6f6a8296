//! HTTP surface: router assembly and health probes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::features;
use crate::ingest::JobTracker;
use crate::middleware;

/// Service name reported by the health endpoints
pub const SERVICE_NAME: &str = "dealsync";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub tracker: JobTracker,
}

/// Build the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_routes = features::router(features::FeatureState {
        tracker: state.tracker.clone(),
    });

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/live", get(liveness_check))
        .with_state(state)
        .merge(feature_routes)
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn service_info() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

/// Ready once the warehouse answers
async fn readiness_check(State(state): State<AppState>) -> Response {
    match state.tracker.warehouse().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "database": "connected",
                "timestamp": Utc::now(),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "database": "unavailable",
                    "timestamp": Utc::now(),
                })),
            )
                .into_response()
        },
    }
}

async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": Utc::now(),
    }))
}
