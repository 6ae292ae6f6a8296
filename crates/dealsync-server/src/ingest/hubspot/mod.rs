//! HubSpot CRM deal extraction
//!
//! Leaves first: [`rate_limiter`] bounds outbound requests per token,
//! [`client`] fetches and classifies pages, [`transform`] maps raw deals onto
//! the warehouse row, [`storage`] merge-writes rows and [`pipeline`] drives
//! one scan from the first page to the last.

pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod memory;
pub mod models;
pub mod pipeline;
pub mod rate_limiter;
pub mod storage;
pub mod transform;

pub use client::{HubSpotClient, PageSequence};
pub use error::HubSpotError;
pub use models::{DealRecord, Page, RawDeal};
pub use pipeline::{ExtractionPipeline, PipelineError};
pub use rate_limiter::{RateLimitConfig, RateLimiterRegistry, SlidingWindowLimiter};
pub use storage::{DealWarehouse, PgDealWarehouse, StorageError};
pub use transform::transform;
