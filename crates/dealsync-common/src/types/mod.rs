//! Identifiers shared between the extraction engine and the HTTP layer

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{DealsyncError, Result};

/// Tenant used when a caller does not name one
pub const DEFAULT_TENANT_ID: &str = "default";

/// Maximum length accepted for a tenant identifier
pub const MAX_TENANT_ID_LEN: usize = 128;

/// Opaque identifier of one extraction scan.
///
/// Freshly generated ids are UUID v4 strings, so they are never reused within
/// or across process lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    /// Allocate a new, unique scan id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ScanId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ScanId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Logical customer namespace isolating records within the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier.
    ///
    /// Tenants must be non-blank and at most [`MAX_TENANT_ID_LEN`] characters.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(DealsyncError::InvalidIdentifier(
                "tenant_id cannot be blank".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_TENANT_ID_LEN {
            return Err(DealsyncError::InvalidIdentifier(format!(
                "tenant_id cannot exceed {} characters",
                MAX_TENANT_ID_LEN
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Resolve an optional tenant, falling back to [`DEFAULT_TENANT_ID`]
    pub fn from_optional(value: Option<String>) -> Self {
        value
            .and_then(|v| Self::new(v).ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self(DEFAULT_TENANT_ID.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
