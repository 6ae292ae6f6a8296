//! Deal extraction pipeline
//!
//! Pulls deal pages in order, transforms each record and merge-writes the
//! batch before asking for the next page. Counters are pushed to the scan
//! registry after every page.

use chrono::Utc;
use dealsync_common::types::{ScanId, TenantId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::client::{HubSpotClient, PageSequence};
use super::error::HubSpotError;
use super::models::Page;
use super::storage::{DealWarehouse, StorageError, DEALS_TABLE};
use super::transform::transform;
use crate::ingest::config::ExtractionConfig;
use crate::ingest::jobs::{LoadSummary, ScanPatch, ScanRegistry};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Api(#[from] HubSpotError),

    #[error("Warehouse write failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Giving up after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: u32, source: HubSpotError },

    #[error("extraction cancelled: shutting down")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// One scan's worth of work against one access token
pub struct ExtractionPipeline {
    client: HubSpotClient,
    warehouse: Arc<dyn DealWarehouse>,
    registry: ScanRegistry,
    config: ExtractionConfig,
    cancel: CancellationToken,
}

impl ExtractionPipeline {
    pub fn new(
        client: HubSpotClient,
        warehouse: Arc<dyn DealWarehouse>,
        registry: ScanRegistry,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            client,
            warehouse,
            registry,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run to the end and record the outcome on the scan
    pub async fn execute(
        self,
        scan_id: ScanId,
        tenant_id: TenantId,
        properties: Vec<String>,
        page_size: u32,
    ) {
        let patch = match self.run(&scan_id, &tenant_id, properties, page_size).await {
            Ok(summary) => ScanPatch::completed(summary),
            Err(e) => {
                error!(scan_id = %scan_id, error = %e, "Extraction failed");
                ScanPatch::failed(e.to_string())
            }
        };

        if let Err(e) = self.registry.update(&scan_id, patch).await {
            warn!(scan_id = %scan_id, error = %e, "Could not record extraction outcome");
        }
    }

    /// Extract every deal page and merge it into the warehouse.
    ///
    /// Batches already written stay committed when a later page fails.
    #[instrument(skip_all, fields(scan_id = %scan_id, tenant_id = %tenant_id, page_size = page_size))]
    pub async fn run(
        &self,
        scan_id: &ScanId,
        tenant_id: &TenantId,
        properties: Vec<String>,
        page_size: u32,
    ) -> Result<LoadSummary> {
        let started = Instant::now();
        let mut pages = self.client.pages(properties, false).with_page_size(page_size);

        let mut pages_processed = 0u64;
        let mut records_processed = 0u64;
        let mut records_skipped = 0u64;
        let mut rows_written = 0u64;
        let mut batches_written = 0u64;

        info!("Starting deal extraction");

        while let Some(page) = self.next_page(&mut pages).await? {
            let extracted_at = Utc::now();
            let mut batch = Vec::with_capacity(page.records.len());
            let mut skipped = 0u64;

            for raw in &page.records {
                if raw.id.trim().is_empty() {
                    skipped += 1;
                    continue;
                }
                batch.push(transform(raw, scan_id, tenant_id, extracted_at));
            }

            if skipped > 0 {
                warn!(skipped, page = pages_processed + 1, "Skipping deals without an id");
            }

            if !batch.is_empty() {
                let written = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                    written = self.warehouse.upsert_deals(&batch) => written?,
                };
                rows_written += written;
                batches_written += 1;
            }

            let count = batch.len() as u64;
            pages_processed += 1;
            records_processed += count;
            records_skipped += skipped;

            if let Err(e) = self
                .registry
                .update(scan_id, ScanPatch::advance(1, count, skipped))
                .await
            {
                warn!(error = %e, "Could not publish progress");
            }

            if pages_processed % self.config.checkpoint_interval == 0 {
                info!(
                    pages = pages_processed,
                    records = records_processed,
                    cursor = pages.cursor().unwrap_or(""),
                    "Checkpoint"
                );
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            pages = pages_processed,
            records = records_processed,
            skipped = records_skipped,
            rows = rows_written,
            duration_ms,
            "Deal extraction completed"
        );

        Ok(LoadSummary {
            tables: vec![DEALS_TABLE.to_string()],
            row_counts: BTreeMap::from([(DEALS_TABLE.to_string(), rows_written)]),
            batches_written,
            records_skipped,
            duration_ms,
        })
    }

    /// Fetch the next page, retrying transient failures on the same cursor
    async fn next_page(&self, pages: &mut PageSequence) -> Result<Option<Page>> {
        let mut attempt = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                result = pages.next_page() => result,
            };

            let err = match result {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            if err.is_fatal() {
                return Err(PipelineError::Api(err));
            }
            if attempt >= self.config.max_retries {
                return Err(PipelineError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: err,
                });
            }

            attempt += 1;
            let delay = err
                .retry_after()
                .unwrap_or_else(|| self.config.retry_delay(attempt));
            warn!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient HubSpot error, retrying"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
