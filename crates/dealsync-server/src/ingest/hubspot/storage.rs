//! Deal warehouse
//!
//! Rows are keyed by `(tenant_id, deal_id)`. Every write is a merge: a deal
//! seen again overwrites its previous row, so re-running an extraction never
//! duplicates data.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use dealsync_common::types::{ScanId, TenantId};
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use super::models::DealRecord;

/// Rows per INSERT statement; 15 binds each keeps well under the Postgres bind limit
const UPSERT_CHUNK_SIZE: usize = 500;

/// Table written by the pipeline
pub const DEALS_TABLE: &str = "deals";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid row in {DEALS_TABLE}: {0}")]
    InvalidRow(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Destination for extracted deals
#[async_trait]
pub trait DealWarehouse: Send + Sync {
    /// Merge-write a batch; returns the number of rows written
    async fn upsert_deals(&self, deals: &[DealRecord]) -> Result<u64>;

    /// Rows last written by `scan_id`, ordered by deal id, with the total count
    async fn fetch_scan_deals(
        &self,
        scan_id: &ScanId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DealRecord>, i64)>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<()>;
}

/// Collapse repeated keys within a batch, keeping the last occurrence.
///
/// A single `INSERT ... ON CONFLICT DO UPDATE` may not touch the same row twice.
pub(crate) fn dedupe_batch(deals: &[DealRecord]) -> Vec<&DealRecord> {
    let mut positions: HashMap<(&str, &str), usize> = HashMap::with_capacity(deals.len());
    let mut unique: Vec<&DealRecord> = Vec::with_capacity(deals.len());

    for deal in deals {
        let key = (deal.tenant_id.as_str(), deal.deal_id.as_str());
        match positions.get(&key) {
            Some(&idx) => unique[idx] = deal,
            None => {
                positions.insert(key, unique.len());
                unique.push(deal);
            }
        }
    }
    unique
}

// ============================================================================
// PostgreSQL
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgDealWarehouse {
    pool: PgPool,
}

impl PgDealWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DealRow {
    deal_id: String,
    tenant_id: String,
    scan_id: String,
    extracted_at: DateTime<Utc>,
    deal_name: Option<String>,
    amount: Option<BigDecimal>,
    deal_stage: Option<String>,
    pipeline: Option<String>,
    close_date: Option<String>,
    description: Option<String>,
    deal_type: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    archived: bool,
    properties: Value,
}

impl TryFrom<DealRow> for DealRecord {
    type Error = StorageError;

    fn try_from(row: DealRow) -> Result<Self> {
        let tenant_id =
            TenantId::new(row.tenant_id).map_err(|e| StorageError::InvalidRow(e.to_string()))?;
        let properties = match row.properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Ok(DealRecord {
            deal_id: row.deal_id,
            tenant_id,
            scan_id: ScanId::from(row.scan_id),
            extracted_at: row.extracted_at,
            deal_name: row.deal_name,
            amount: row.amount,
            deal_stage: row.deal_stage,
            pipeline: row.pipeline,
            close_date: row.close_date,
            description: row.description,
            deal_type: row.deal_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
            archived: row.archived,
            properties,
        })
    }
}

#[async_trait]
impl DealWarehouse for PgDealWarehouse {
    async fn upsert_deals(&self, deals: &[DealRecord]) -> Result<u64> {
        if deals.is_empty() {
            return Ok(0);
        }

        let unique = dedupe_batch(deals);
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for chunk in unique.chunks(UPSERT_CHUNK_SIZE) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO deals (
                    tenant_id, deal_id, scan_id, extracted_at,
                    deal_name, amount, deal_stage, pipeline, close_date,
                    description, deal_type, created_at, updated_at,
                    archived, properties
                )
                "#,
            );

            query_builder.push_values(chunk, |mut b, deal| {
                b.push_bind(deal.tenant_id.as_str())
                    .push_bind(&deal.deal_id)
                    .push_bind(deal.scan_id.as_str())
                    .push_bind(deal.extracted_at)
                    .push_bind(&deal.deal_name)
                    .push_bind(&deal.amount)
                    .push_bind(&deal.deal_stage)
                    .push_bind(&deal.pipeline)
                    .push_bind(&deal.close_date)
                    .push_bind(&deal.description)
                    .push_bind(&deal.deal_type)
                    .push_bind(deal.created_at)
                    .push_bind(deal.updated_at)
                    .push_bind(deal.archived)
                    .push_bind(Value::Object(deal.properties.clone()));
            });

            query_builder.push(
                r#"
                ON CONFLICT (tenant_id, deal_id) DO UPDATE SET
                    scan_id = EXCLUDED.scan_id,
                    extracted_at = EXCLUDED.extracted_at,
                    deal_name = EXCLUDED.deal_name,
                    amount = EXCLUDED.amount,
                    deal_stage = EXCLUDED.deal_stage,
                    pipeline = EXCLUDED.pipeline,
                    close_date = EXCLUDED.close_date,
                    description = EXCLUDED.description,
                    deal_type = EXCLUDED.deal_type,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at,
                    archived = EXCLUDED.archived,
                    properties = EXCLUDED.properties,
                    loaded_at = NOW()
                "#,
            );

            let result = query_builder.build().execute(&mut *tx).await?;
            written += result.rows_affected();
        }

        tx.commit().await?;

        debug!(rows = written, "Upserted deals batch");
        Ok(written)
    }

    async fn fetch_scan_deals(
        &self,
        scan_id: &ScanId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DealRecord>, i64)> {
        let rows: Vec<DealRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, deal_id, scan_id, extracted_at,
                   deal_name, amount, deal_stage, pipeline, close_date,
                   description, deal_type, created_at, updated_at,
                   archived, properties
            FROM deals
            WHERE scan_id = $1
            ORDER BY deal_id, tenant_id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(scan_id.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE scan_id = $1")
            .bind(scan_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        let records = rows
            .into_iter()
            .map(DealRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((records, total))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
