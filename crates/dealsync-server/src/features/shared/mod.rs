//! Shared utilities and types for feature modules
//!
//! - **pagination**: offset pagination parameters

pub mod pagination;

pub use pagination::PageWindow;
