//! List scans query

use mediator::Request;
use serde::{Deserialize, Serialize};

use super::get_status::ScanStatusResponse;
use crate::ingest::{JobError, JobTracker, ScanStatus};

/// Optional filter of `GET /extractions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListScansQuery {
    #[serde(default)]
    pub status: Option<ScanStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListScansResponse {
    pub scans: Vec<ScanStatusResponse>,
    pub total: usize,
}

impl Request<Result<ListScansResponse, JobError>> for ListScansQuery {}

pub async fn handle(tracker: &JobTracker, query: ListScansQuery) -> Result<ListScansResponse, JobError> {
    let scans: Vec<ScanStatusResponse> = tracker
        .list()
        .await
        .into_iter()
        .filter(|run| query.status.map_or(true, |status| run.status == status))
        .map(ScanStatusResponse::from)
        .collect();

    Ok(ListScansResponse {
        total: scans.len(),
        scans,
    })
}
