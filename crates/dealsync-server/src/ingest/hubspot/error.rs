//! HubSpot client error taxonomy
//!
//! Every failed request is classified into exactly one [`HubSpotError`] kind so
//! the pipeline can decide between aborting and retrying without looking at
//! message text.

use std::time::Duration;
use thiserror::Error;

/// `Retry-After` fallback when a 429 response carries no usable header
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Maximum number of response body bytes kept in a [`HubSpotError::RemoteApi`]
const MAX_ERROR_BODY_LEN: usize = 2048;

pub type Result<T> = std::result::Result<T, HubSpotError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubSpotError {
    #[error("Authentication failed. Check your access token.")]
    AuthenticationFailed,

    #[error("Access forbidden. Check your API scopes.")]
    AuthorizationFailed,

    #[error("Rate limit exceeded. Retry after {} seconds", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Request timeout. HubSpot API did not respond in time.")]
    Timeout,

    #[error("API error {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("Request error: {0}")]
    Transport(String),

    #[error("Failed to decode HubSpot response: {0}")]
    Decode(String),
}

impl HubSpotError {
    /// Build a remote API error, truncating oversized bodies
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Self::RemoteApi { status, body }
    }

    /// Errors that may succeed when the same request is issued again later
    pub fn is_transient(&self) -> bool {
        match self {
            HubSpotError::RateLimited { .. } | HubSpotError::Timeout | HubSpotError::Transport(_) => {
                true
            }
            HubSpotError::RemoteApi { status, .. } => matches!(status, 500..=599),
            HubSpotError::AuthenticationFailed
            | HubSpotError::AuthorizationFailed
            | HubSpotError::Decode(_) => false,
        }
    }

    /// Errors that must abort a run immediately
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Delay the server asked for, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HubSpotError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HubSpotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HubSpotError::Timeout
        } else if err.is_decode() {
            HubSpotError::Decode(err.to_string())
        } else {
            HubSpotError::Transport(err.to_string())
        }
    }
}
