//! Deal ingestion
//!
//! # Architecture
//!
//! - **config**: HubSpot client and pipeline settings (`HUBSPOT_*`, `EXTRACTION_*`)
//! - **hubspot**: rate limiter, API client, transformer, warehouse and pipeline
//! - **jobs**: scan registry and the tracker that starts and observes runs
//!
//! # Public API
//!
//! Extractions are started and polled through the `features::extractions`
//! module:
//! - `POST /extractions` - Start an extraction
//! - `GET /extractions` - List scans
//! - `GET /extractions/:scan_id/status` - Scan status and progress
//! - `GET /extractions/:scan_id/results` - Rows written by a completed scan

pub mod config;
pub mod hubspot;
pub mod jobs;

pub use config::{ExtractionConfig, HubSpotConfig};
pub use jobs::{
    JobError, JobTracker, LoadSummary, ResultsPage, ScanPatch, ScanProgress, ScanRegistry,
    ScanRun, ScanStatus, StartExtraction,
};
