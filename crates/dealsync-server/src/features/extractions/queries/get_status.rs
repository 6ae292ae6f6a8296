//! Get scan status query

use chrono::{DateTime, Utc};
use dealsync_common::types::ScanId;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::ingest::{JobError, JobTracker, LoadSummary, ScanProgress, ScanRun, ScanStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetScanStatusQuery {
    pub scan_id: String,
}

/// Response of `GET /extractions/:scan_id/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStatusResponse {
    pub scan_id: String,
    pub tenant_id: String,
    pub status: ScanStatus,
    pub progress: ScanProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_summary: Option<LoadSummary>,
}

impl From<ScanRun> for ScanStatusResponse {
    fn from(run: ScanRun) -> Self {
        Self {
            scan_id: run.scan_id.to_string(),
            tenant_id: run.tenant_id.to_string(),
            status: run.status,
            progress: run.progress,
            error: run.error,
            started_at: run.started_at,
            completed_at: run.completed_at,
            load_summary: run.load_summary,
        }
    }
}

impl Request<Result<ScanStatusResponse, JobError>> for GetScanStatusQuery {}

pub async fn handle(
    tracker: &JobTracker,
    query: GetScanStatusQuery,
) -> Result<ScanStatusResponse, JobError> {
    let run = tracker.get(&ScanId::from(query.scan_id)).await?;
    Ok(run.into())
}
