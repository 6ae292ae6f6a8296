//! dealsync server library
//!
//! Extracts HubSpot CRM deals into a PostgreSQL warehouse.
//!
//! # Overview
//!
//! - **API Endpoints**: start extractions, poll their status, read results
//! - **Ingestion**: rate-limited HubSpot client, record transformer and an
//!   extraction pipeline running as background tasks
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS and request logging
//!
//! # Architecture
//!
//! Requests are handled by feature slices (`features::extractions`) whose
//! commands and queries call into the [`ingest::JobTracker`]. The tracker
//! owns the scan registry and spawns one pipeline task per extraction.
//!
//! # Example
//!
//! ```no_run
//! use dealsync_server::{api, config::Config, ingest::{hubspot::PgDealWarehouse, JobTracker}};
//! use std::sync::Arc;
//!
//! # async fn run(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let tracker = JobTracker::new(
//!     Arc::new(PgDealWarehouse::new(pool)),
//!     config.hubspot.clone(),
//!     config.extraction.clone(),
//! );
//! let app = api::create_router(api::AppState { tracker }, &config);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

pub use error::AppError;
