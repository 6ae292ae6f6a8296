//! Error types shared across the dealsync crates

use thiserror::Error;

/// Result type alias for shared dealsync operations
pub type Result<T> = std::result::Result<T, DealsyncError>;

/// Errors that are not specific to one layer of the service
#[derive(Error, Debug)]
pub enum DealsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DealsyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
