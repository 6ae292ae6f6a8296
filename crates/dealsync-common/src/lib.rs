//! Dealsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup and error handling for the dealsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`DealsyncError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber configuration driven by `LOG_*` variables
//! - **Types**: identifiers shared by the extraction engine and the HTTP layer
//!
//! # Example
//!
//! ```no_run
//! use dealsync_common::types::{ScanId, TenantId};
//!
//! let scan_id = ScanId::generate();
//! let tenant = TenantId::from_optional(None);
//! assert_eq!(tenant.as_str(), "default");
//! println!("scan {} for tenant {}", scan_id, tenant);
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DealsyncError, Result};
