//! Extraction configuration
//!
//! HubSpot client and pipeline settings, read from `HUBSPOT_*` and
//! `EXTRACTION_*` environment variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::hubspot::rate_limiter::{RateLimitConfig, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};

/// Default HubSpot API origin
pub const DEFAULT_HUBSPOT_API_BASE_URL: &str = "https://api.hubapi.com";

/// Default per-request timeout in seconds
pub const DEFAULT_HUBSPOT_API_TIMEOUT_SECS: u64 = 30;

/// HubSpot caps list requests at 100 objects
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default number of pages between progress checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 10;

/// Default number of retries for a transient page failure
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff, in milliseconds
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// HubSpot API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotConfig {
    pub api_base_url: String,
    pub timeout_secs: u64,
    /// Requests allowed per rate-limit window, per access token
    pub rate_limit_requests: usize,
    pub rate_limit_window_secs: u64,
}

impl HubSpotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            api_base_url: std::env::var("HUBSPOT_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_HUBSPOT_API_BASE_URL.to_string()),
            timeout_secs: env_or("HUBSPOT_API_TIMEOUT", DEFAULT_HUBSPOT_API_TIMEOUT_SECS),
            rate_limit_requests: env_or("HUBSPOT_RATE_LIMIT_REQUESTS", DEFAULT_MAX_REQUESTS),
            rate_limit_window_secs: env_or(
                "HUBSPOT_RATE_LIMIT_WINDOW_SECS",
                DEFAULT_WINDOW.as_secs(),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            anyhow::bail!(
                "HUBSPOT_API_BASE_URL must start with http:// or https://, got '{}'",
                self.api_base_url
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("HUBSPOT_API_TIMEOUT must be greater than 0");
        }
        if self.rate_limit_requests == 0 {
            anyhow::bail!("HUBSPOT_RATE_LIMIT_REQUESTS must be greater than 0");
        }
        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("HUBSPOT_RATE_LIMIT_WINDOW_SECS must be greater than 0");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_HUBSPOT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_HUBSPOT_API_TIMEOUT_SECS,
            rate_limit_requests: DEFAULT_MAX_REQUESTS,
            rate_limit_window_secs: DEFAULT_WINDOW.as_secs(),
        }
    }
}

/// Pipeline behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Pages between checkpoint log lines
    pub checkpoint_interval: u64,
    /// Retries of the same page request after a transient failure
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl ExtractionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            checkpoint_interval: env_or("EXTRACTION_CHECKPOINT_INTERVAL", DEFAULT_CHECKPOINT_INTERVAL),
            max_retries: env_or("EXTRACTION_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_base_delay_ms: env_or("EXTRACTION_RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.checkpoint_interval == 0 {
            anyhow::bail!("EXTRACTION_CHECKPOINT_INTERVAL must be greater than 0");
        }
        Ok(())
    }

    /// Backoff before retry number `attempt` (1-based), capped at 60 seconds
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor)).min(Duration::from_secs(60))
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

/// Clamp a caller-supplied page size to what HubSpot accepts
pub fn clamp_page_size(limit: Option<u32>) -> u32 {
    limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
