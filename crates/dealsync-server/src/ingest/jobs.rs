//! Extraction job tracking
//!
//! [`ScanRegistry`] holds the state of every scan started by this process.
//! [`JobTracker`] starts pipeline runs as detached tasks and answers status
//! and result queries against the registry and the warehouse.

use chrono::{DateTime, Utc};
use dealsync_common::types::{ScanId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, instrument};

use super::config::{clamp_page_size, ExtractionConfig, HubSpotConfig};
use super::hubspot::client::HubSpotClient;
use super::hubspot::error::HubSpotError;
use super::hubspot::models::DealRecord;
use super::hubspot::pipeline::ExtractionPipeline;
use super::hubspot::rate_limiter::RateLimiterRegistry;
use super::hubspot::storage::{DealWarehouse, StorageError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Scan not found: {0}")]
    NotFound(ScanId),

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Api(#[from] HubSpotError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, JobError>;

// ============================================================================
// Scan state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanStatus::Running)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live counters of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub pages_processed: u64,
    pub records_processed: u64,
    /// Records dropped because they carried no deal id
    pub records_skipped: u64,
}

impl ScanProgress {
    fn add(&mut self, other: &ScanProgress) {
        self.pages_processed += other.pages_processed;
        self.records_processed += other.records_processed;
        self.records_skipped += other.records_skipped;
    }
}

/// What a completed scan wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub tables: Vec<String>,
    pub row_counts: BTreeMap<String, u64>,
    /// Upsert batches committed
    pub batches_written: u64,
    pub records_skipped: u64,
    pub duration_ms: u64,
}

/// State of one extraction scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRun {
    pub scan_id: ScanId,
    pub tenant_id: TenantId,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: ScanProgress,
    pub error: Option<String>,
    pub load_summary: Option<LoadSummary>,
}

impl ScanRun {
    pub fn running(scan_id: ScanId, tenant_id: TenantId) -> Self {
        Self {
            scan_id,
            tenant_id,
            status: ScanStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            progress: ScanProgress::default(),
            error: None,
            load_summary: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    Set(ScanProgress),
    Increment(ScanProgress),
}

/// Partial mutation of a [`ScanRun`]; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPatch {
    pub status: Option<ScanStatus>,
    pub progress: Option<CounterUpdate>,
    pub error: Option<String>,
    pub load_summary: Option<LoadSummary>,
}

impl ScanPatch {
    pub fn advance(pages: u64, records: u64, skipped: u64) -> Self {
        Self {
            progress: Some(CounterUpdate::Increment(ScanProgress {
                pages_processed: pages,
                records_processed: records,
                records_skipped: skipped,
            })),
            ..Default::default()
        }
    }

    pub fn completed(summary: LoadSummary) -> Self {
        Self {
            status: Some(ScanStatus::Completed),
            load_summary: Some(summary),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(ScanStatus::Failed),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    fn apply(self, run: &mut ScanRun) -> Result<()> {
        if run.status.is_terminal() {
            return Err(JobError::InvalidState(format!(
                "Scan {} is already {}",
                run.scan_id, run.status
            )));
        }

        match self.progress {
            Some(CounterUpdate::Set(progress)) => run.progress = progress,
            Some(CounterUpdate::Increment(delta)) => run.progress.add(&delta),
            None => {}
        }
        if let Some(error) = self.error {
            run.error = Some(error);
        }
        if let Some(summary) = self.load_summary {
            run.load_summary = Some(summary);
        }
        if let Some(status) = self.status {
            run.status = status;
            if status.is_terminal() {
                run.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Shared map of scan id to run state, alive for the whole process
#[derive(Debug, Clone, Default)]
pub struct ScanRegistry {
    runs: Arc<RwLock<HashMap<ScanId, ScanRun>>>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run: ScanRun) {
        self.runs.write().await.insert(run.scan_id.clone(), run);
    }

    pub async fn get(&self, scan_id: &ScanId) -> Result<ScanRun> {
        self.runs
            .read()
            .await
            .get(scan_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(scan_id.clone()))
    }

    /// Every known run, newest first
    pub async fn list(&self) -> Vec<ScanRun> {
        let mut runs: Vec<ScanRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.scan_id.cmp(&b.scan_id))
        });
        runs
    }

    /// Apply a patch atomically and return the updated run
    pub async fn update(&self, scan_id: &ScanId, patch: ScanPatch) -> Result<ScanRun> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(scan_id)
            .ok_or_else(|| JobError::NotFound(scan_id.clone()))?;
        patch.apply(run)?;
        Ok(run.clone())
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Parameters of a new extraction
#[derive(Clone)]
pub struct StartExtraction {
    pub access_token: String,
    pub tenant_id: TenantId,
    /// Properties to request; empty means the default set
    pub properties: Vec<String>,
    pub page_size: u32,
}

impl fmt::Debug for StartExtraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartExtraction")
            .field("access_token", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("properties", &self.properties)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// One page of rows written by a completed scan
#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub scan_id: ScanId,
    pub status: ScanStatus,
    pub records: Vec<DealRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Clone)]
pub struct JobTracker {
    registry: ScanRegistry,
    warehouse: Arc<dyn DealWarehouse>,
    limiters: RateLimiterRegistry,
    hubspot: HubSpotConfig,
    extraction: ExtractionConfig,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

impl JobTracker {
    pub fn new(
        warehouse: Arc<dyn DealWarehouse>,
        hubspot: HubSpotConfig,
        extraction: ExtractionConfig,
    ) -> Self {
        let limiters = RateLimiterRegistry::new(hubspot.rate_limit());
        Self {
            registry: ScanRegistry::new(),
            warehouse,
            limiters,
            hubspot,
            extraction,
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &ScanRegistry {
        &self.registry
    }

    pub fn warehouse(&self) -> &Arc<dyn DealWarehouse> {
        &self.warehouse
    }

    async fn client_for(&self, access_token: &str) -> Result<HubSpotClient> {
        let limiter = self.limiters.for_token(access_token).await;
        Ok(HubSpotClient::new(&self.hubspot, access_token, limiter)?)
    }

    /// Register a running scan and spawn its pipeline; returns without waiting
    #[instrument(skip(self, params), fields(tenant_id = %params.tenant_id))]
    pub async fn start(&self, params: StartExtraction) -> Result<ScanId> {
        if self.tasks.is_closed() {
            return Err(JobError::InvalidState(
                "Service is shutting down; no new extractions are accepted".to_string(),
            ));
        }

        let client = self.client_for(&params.access_token).await?;
        let scan_id = ScanId::generate();
        self.registry
            .insert(ScanRun::running(scan_id.clone(), params.tenant_id.clone()))
            .await;

        let pipeline = ExtractionPipeline::new(
            client,
            self.warehouse.clone(),
            self.registry.clone(),
            self.extraction.clone(),
        )
        .with_cancellation(self.cancel.child_token());

        let page_size = clamp_page_size(Some(params.page_size));
        let task_scan_id = scan_id.clone();
        self.tasks.spawn(async move {
            pipeline
                .execute(task_scan_id, params.tenant_id, params.properties, page_size)
                .await;
        });

        info!(scan_id = %scan_id, "Extraction started");
        Ok(scan_id)
    }

    pub async fn get(&self, scan_id: &ScanId) -> Result<ScanRun> {
        self.registry.get(scan_id).await
    }

    pub async fn list(&self) -> Vec<ScanRun> {
        self.registry.list().await
    }

    pub async fn update(&self, scan_id: &ScanId, patch: ScanPatch) -> Result<ScanRun> {
        self.registry.update(scan_id, patch).await
    }

    /// Rows written by a completed scan, ordered by deal id
    pub async fn list_results(&self, scan_id: &ScanId, limit: i64, offset: i64) -> Result<ResultsPage> {
        let run = self.registry.get(scan_id).await?;
        if run.status != ScanStatus::Completed {
            return Err(JobError::InvalidState(format!(
                "Scan {} is {}; results are available once it has completed",
                scan_id, run.status
            )));
        }

        let (records, total) = self
            .warehouse
            .fetch_scan_deals(scan_id, limit, offset)
            .await?;

        Ok(ResultsPage {
            scan_id: scan_id.clone(),
            status: run.status,
            records,
            total,
            limit,
            offset,
        })
    }

    /// Issue a one-record request with the token
    pub async fn validate_credentials(&self, access_token: &str) -> Result<bool> {
        let client = self.client_for(access_token).await?;
        Ok(client.validate_credentials().await?)
    }

    /// Number of pipeline tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel in-flight runs and wait for their tasks to finish
    pub async fn shutdown(&self) {
        info!(active = self.tasks.len(), "Stopping extraction tasks");
        self.tasks.close();
        self.cancel.cancel();
        self.tasks.wait().await;
    }
}

impl fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTracker")
            .field("hubspot", &self.hubspot)
            .field("extraction", &self.extraction)
            .field("active_tasks", &self.tasks.len())
            .finish()
    }
}
