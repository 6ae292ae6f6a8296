//! Test helpers for dealsync server integration tests
//!
//! - A fake HubSpot API served by wiremock
//! - An in-memory warehouse behind the real router, merging on
//!   `(tenant_id, deal_id)` like the PostgreSQL one
//! - Request and polling shortcuts

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use dealsync_common::types::{ScanId, TenantId};
use dealsync_server::{
    api::{self, AppState},
    config::Config,
    ingest::{
        hubspot::{storage, DealRecord, DealWarehouse, StorageError},
        ExtractionConfig, HubSpotConfig, JobTracker,
    },
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceExt;
use wiremock::MockServer;

pub const DEALS_PATH: &str = "/crm/v3/objects/deals";

/// Router wired to a fake HubSpot and an in-memory warehouse
pub struct TestApp {
    pub router: Router,
    pub tracker: JobTracker,
    pub warehouse: MemoryWarehouse,
    pub hubspot: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let hubspot = MockServer::start().await;
        let warehouse = MemoryWarehouse::new();
        let tracker = tracker_for(&hubspot, Arc::new(warehouse.clone()));
        let router = api::create_router(
            AppState {
                tracker: tracker.clone(),
            },
            &Config::default(),
        );

        Self {
            router,
            tracker,
            warehouse,
            hubspot,
        }
    }

    /// Send a request and decode the JSON response body
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Start an extraction and return its scan id
    pub async fn start_extraction(&self, body: Value) -> String {
        let (status, response) = self.post("/extractions", body).await;
        assert_eq!(status, StatusCode::OK, "unexpected response {response}");
        response["scan_id"].as_str().unwrap().to_string()
    }

    /// Poll the status endpoint until the scan leaves `running`
    pub async fn wait_until_finished(&self, scan_id: &str) -> Value {
        for _ in 0..300 {
            let (status, body) = self.get(&format!("/extractions/{scan_id}/status")).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] != "running" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("scan {scan_id} did not finish");
    }
}

pub fn tracker_for(hubspot: &MockServer, warehouse: Arc<dyn DealWarehouse>) -> JobTracker {
    let config = HubSpotConfig {
        api_base_url: hubspot.uri(),
        ..Default::default()
    };
    let extraction = ExtractionConfig {
        retry_base_delay_ms: 10,
        ..Default::default()
    };
    JobTracker::new(warehouse, config, extraction)
}

/// A HubSpot list response with deals `range`, pointing at `after` when given
pub fn deals_page(range: std::ops::Range<u32>, after: Option<&str>) -> Value {
    let results: Vec<Value> = range
        .map(|i| {
            json!({
                "id": i.to_string(),
                "properties": {
                    "dealname": format!("Deal {i}"),
                    "amount": format!("{}.50", i * 10),
                    "dealstage": "appointmentscheduled",
                    "pipeline": "default",
                    "createdate": "1700000000000",
                    "hs_lastmodifieddate": "1700000360000"
                },
                "archived": false
            })
        })
        .collect();

    match after {
        Some(after) => json!({"results": results, "paging": {"next": {"after": after}}}),
        None => json!({"results": results}),
    }
}

/// Warehouse whose every call fails, for readiness and failure paths
#[derive(Debug, Clone, Default)]
pub struct UnavailableWarehouse;

#[async_trait]
impl DealWarehouse for UnavailableWarehouse {
    async fn upsert_deals(&self, _deals: &[DealRecord]) -> storage::Result<u64> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn fetch_scan_deals(
        &self,
        _scan_id: &ScanId,
        _limit: i64,
        _offset: i64,
    ) -> storage::Result<(Vec<DealRecord>, i64)> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn ping(&self) -> storage::Result<()> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// In-memory warehouse merging on `(tenant_id, deal_id)`
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    rows: Arc<RwLock<BTreeMap<(String, String), DealRecord>>>,
    writes: Arc<RwLock<u64>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
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
impl DealWarehouse for MemoryWarehouse {
    async fn upsert_deals(&self, deals: &[DealRecord]) -> storage::Result<u64> {
        if deals.is_empty() {
            return Ok(0);
        }

        let mut rows = self.rows.write().await;
        let mut keys = HashSet::new();
        for deal in deals {
            let key = (deal.tenant_id.as_str().to_string(), deal.deal_id.clone());
            keys.insert(key.clone());
            rows.insert(key, deal.clone());
        }
        *self.writes.write().await += 1;

        Ok(keys.len() as u64)
    }

    async fn fetch_scan_deals(
        &self,
        scan_id: &ScanId,
        limit: i64,
        offset: i64,
    ) -> storage::Result<(Vec<DealRecord>, i64)> {
        let rows = self.rows.read().await;
        let mut matching: Vec<&DealRecord> =
            rows.values().filter(|d| &d.scan_id == scan_id).collect();
        matching.sort_by(|a, b| a.deal_id.cmp(&b.deal_id));

        let total = matching.len() as i64;
        let records = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((records, total))
    }

    async fn ping(&self) -> storage::Result<()> {
        Ok(())
    }
}
