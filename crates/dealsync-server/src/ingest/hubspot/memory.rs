//! In-memory warehouse for unit tests

use async_trait::async_trait;
use dealsync_common::types::{ScanId, TenantId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::DealRecord;
use super::storage::{dedupe_batch, DealWarehouse, Result};

/// Process-local warehouse with the same merge semantics as [`super::PgDealWarehouse`]
#[derive(Debug, Clone, Default)]
pub struct MemoryDealWarehouse {
    rows: Arc<RwLock<BTreeMap<(String, String), DealRecord>>>,
    writes: Arc<RwLock<u64>>,
}

impl MemoryDealWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct `(tenant_id, deal_id)` rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Number of `upsert_deals` calls that wrote at least one row
    pub async fn write_count(&self) -> u64 {
        *self.writes.read().await
    }

    pub async fn get(&self, tenant_id: &TenantId, deal_id: &str) -> Option<DealRecord> {
        self.rows
            .read()
            .await
            .get(&(tenant_id.as_str().to_string(), deal_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DealWarehouse for MemoryDealWarehouse {
    async fn upsert_deals(&self, deals: &[DealRecord]) -> Result<u64> {
        if deals.is_empty() {
            return Ok(0);
        }

        let unique = dedupe_batch(deals);
        let mut rows = self.rows.write().await;
        for deal in &unique {
            rows.insert(
                (deal.tenant_id.as_str().to_string(), deal.deal_id.clone()),
                (*deal).clone(),
            );
        }
        *self.writes.write().await += 1;

        Ok(unique.len() as u64)
    }

    async fn fetch_scan_deals(
        &self,
        scan_id: &ScanId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DealRecord>, i64)> {
        let rows = self.rows.read().await;
        let mut matching: Vec<&DealRecord> =
            rows.values().filter(|d| &d.scan_id == scan_id).collect();
        matching.sort_by(|a, b| {
            (a.deal_id.as_str(), a.tenant_id.as_str()).cmp(&(b.deal_id.as_str(), b.tenant_id.as_str()))
        });

        let total = matching.len() as i64;
        let records = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((records, total))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use serde_json::Map;
    use std::str::FromStr;

    fn deal(tenant: &str, id: &str, scan: &str, name: &str) -> DealRecord {
        DealRecord {
            deal_id: id.to_string(),
            tenant_id: TenantId::new(tenant).unwrap(),
            scan_id: ScanId::from(scan),
            extracted_at: Utc::now(),
            deal_name: Some(name.to_string()),
            amount: Some(BigDecimal::from_str("10").unwrap()),
            deal_stage: None,
            pipeline: None,
            close_date: None,
            description: None,
            deal_type: None,
            created_at: None,
            updated_at: None,
            archived: false,
            properties: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_memory_upsert_merges_on_key() {
        let warehouse = MemoryDealWarehouse::new();
        warehouse
            .upsert_deals(&[deal("acme", "1", "s1", "old"), deal("acme", "2", "s1", "b")])
            .await
            .unwrap();
        warehouse
            .upsert_deals(&[deal("acme", "1", "s2", "new")])
            .await
            .unwrap();

        assert_eq!(warehouse.len().await, 2);
        let row = warehouse
            .get(&TenantId::new("acme").unwrap(), "1")
            .await
            .unwrap();
        assert_eq!(row.deal_name.as_deref(), Some("new"));
        assert_eq!(row.scan_id.as_str(), "s2");
    }

    #[tokio::test]
    async fn test_memory_fetch_scan_deals_pages_in_order() {
        let warehouse = MemoryDealWarehouse::new();
        warehouse
            .upsert_deals(&[
                deal("acme", "3", "s1", "c"),
                deal("acme", "1", "s1", "a"),
                deal("acme", "2", "s1", "b"),
                deal("acme", "9", "other", "z"),
            ])
            .await
            .unwrap();

        let (records, total) = warehouse
            .fetch_scan_deals(&ScanId::from("s1"), 2, 1)
            .await
            .unwrap();

        assert_eq!(total, 3);
        let ids: Vec<_> = records.iter().map(|d| d.deal_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_a_write() {
        let warehouse = MemoryDealWarehouse::new();
        assert_eq!(warehouse.upsert_deals(&[]).await.unwrap(), 0);
        assert_eq!(warehouse.write_count().await, 0);
    }
}
