//! Get scan results query
//!
//! Reads the rows a completed scan last wrote to the warehouse.

use dealsync_common::types::ScanId;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::features::shared::pagination::PageWindow;
use crate::ingest::{JobError, JobTracker, ResultsPage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetScanResultsQuery {
    pub scan_id: String,
    #[serde(flatten)]
    pub window: PageWindow,
}

impl Request<Result<ResultsPage, JobError>> for GetScanResultsQuery {}

pub async fn handle(tracker: &JobTracker, query: GetScanResultsQuery) -> Result<ResultsPage, JobError> {
    let scan_id = ScanId::from(query.scan_id);
    tracker
        .list_results(&scan_id, query.window.limit(), query.window.offset())
        .await
}
