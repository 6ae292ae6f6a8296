//! Shared pagination utilities
//!
//! Offset pagination for warehouse reads.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dealsync_server::features::shared::pagination::PageWindow;
//!
//! let window = PageWindow::new(Some(50), Some(100));
//! assert_eq!(window.limit(), 50);
//! assert_eq!(window.offset(), 100);
//! ```

use serde::{Deserialize, Serialize};

/// Default rows per page
pub const DEFAULT_LIMIT: i64 = 100;

/// Upper bound on rows per page
pub const MAX_LIMIT: i64 = 1000;

/// `limit` / `offset` request parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PageWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl PageWindow {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Rows per page, defaulting to 100 and clamped to 1-1000
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Rows to skip; negative values count as 0
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
