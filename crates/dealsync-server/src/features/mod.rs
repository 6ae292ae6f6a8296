//! Feature modules implementing the dealsync API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **extractions**: start extractions, poll status, read results, validate tokens
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Operations that start work or call out to HubSpot
//! - `queries/` - Read operations (get, list)
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator pattern using the `mediator` crate.

pub mod extractions;
pub mod shared;

use axum::Router;

use crate::ingest::JobTracker;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub tracker: JobTracker,
}

/// Mounts every feature under its path prefix:
/// - `/extractions` - Extraction jobs
/// - `/credentials` - Token validation
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest(
            "/extractions",
            extractions::extractions_routes().with_state(state.tracker.clone()),
        )
        .nest(
            "/credentials",
            extractions::credentials_routes().with_state(state.tracker),
        )
}
