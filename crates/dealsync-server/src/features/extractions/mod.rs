//! Extractions feature module
//!
//! Starts HubSpot deal extractions and exposes their status and results.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::{credentials_routes, extractions_routes};
