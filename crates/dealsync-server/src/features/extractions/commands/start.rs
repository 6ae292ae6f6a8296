//! Start extraction command
//!
//! Registers a new scan and hands it to a background pipeline task. The
//! handler returns as soon as the scan is registered.

use dealsync_common::types::TenantId;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::ingest::config::clamp_page_size;
use crate::ingest::{JobError, JobTracker, StartExtraction};

/// Request body of `POST /extractions`
#[derive(Clone, Deserialize)]
pub struct StartExtractionCommand {
    /// HubSpot private app token
    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Page size, clamped to 1-100
    #[serde(default)]
    pub limit: Option<u32>,

    /// Deal properties to request; the default set when absent or empty
    #[serde(default)]
    pub properties: Option<Vec<String>>,
}

impl std::fmt::Debug for StartExtractionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartExtractionCommand")
            .field("access_token", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("limit", &self.limit)
            .field("properties", &self.properties)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExtractionResponse {
    pub scan_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StartExtractionError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Job(#[from] JobError),
}

impl Request<Result<StartExtractionResponse, StartExtractionError>> for StartExtractionCommand {}

impl StartExtractionCommand {
    /// Check the body and resolve defaults
    pub fn validate(&self) -> Result<StartExtraction, StartExtractionError> {
        let access_token = self.access_token.trim();
        if access_token.is_empty() {
            return Err(StartExtractionError::Validation(
                "access_token is required".to_string(),
            ));
        }

        let tenant_id = match &self.tenant_id {
            Some(tenant) => TenantId::new(tenant.as_str())
                .map_err(|e| StartExtractionError::Validation(e.to_string()))?,
            None => TenantId::default(),
        };

        let properties = self
            .properties
            .iter()
            .flatten()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(StartExtraction {
            access_token: access_token.to_string(),
            tenant_id,
            properties,
            page_size: clamp_page_size(self.limit),
        })
    }
}

#[tracing::instrument(skip(tracker, command))]
pub async fn handle(
    tracker: &JobTracker,
    command: StartExtractionCommand,
) -> Result<StartExtractionResponse, StartExtractionError> {
    let params = command.validate()?;
    let scan_id = tracker.start(params).await?;

    Ok(StartExtractionResponse {
        message: format!("Extraction started with scan_id: {}", scan_id),
        scan_id: scan_id.to_string(),
        status: "started".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(token: &str) -> StartExtractionCommand {
        StartExtractionCommand {
            access_token: token.to_string(),
            tenant_id: None,
            limit: None,
            properties: None,
        }
    }

    #[test]
    fn test_blank_token_rejected() {
        assert!(matches!(
            command("   ").validate(),
            Err(StartExtractionError::Validation(_))
        ));
    }

    #[test]
    fn test_defaults_resolved() {
        let params = command("tok").validate().unwrap();
        assert_eq!(params.tenant_id.as_str(), "default");
        assert_eq!(params.page_size, 100);
        assert!(params.properties.is_empty());
    }

    #[test]
    fn test_limit_clamped_and_properties_cleaned() {
        let mut cmd = command("tok");
        cmd.limit = Some(1000);
        cmd.tenant_id = Some(" acme ".to_string());
        cmd.properties = Some(vec!["dealname".into(), " ".into(), "amount".into()]);

        let params = cmd.validate().unwrap();
        assert_eq!(params.page_size, 100);
        assert_eq!(params.tenant_id.as_str(), "acme");
        assert_eq!(params.properties, vec!["dealname", "amount"]);
    }

    #[test]
    fn test_blank_tenant_rejected() {
        let mut cmd = command("tok");
        cmd.tenant_id = Some("".to_string());
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        assert!(!format!("{:?}", command("secret")).contains("secret"));
    }
}
