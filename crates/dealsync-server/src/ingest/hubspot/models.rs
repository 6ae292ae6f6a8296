//! HubSpot wire types and the normalized deal row

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use dealsync_common::types::{ScanId, TenantId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Properties requested when the caller does not name any
pub const DEFAULT_DEAL_PROPERTIES: &[&str] = &[
    "dealname",
    "amount",
    "dealstage",
    "pipeline",
    "closedate",
    "createdate",
    "hs_lastmodifieddate",
    "description",
    "dealtype",
];

/// One deal object as returned by `GET /crm/v3/objects/deals`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeal {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub properties: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub archived: bool,
}

/// List response envelope
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DealListResponse {
    #[serde(default)]
    pub results: Vec<RawDeal>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NextPage {
    #[serde(default, deserialize_with = "string_or_number")]
    pub after: String,
}

impl DealListResponse {
    pub(crate) fn into_page(self) -> Page {
        let next_cursor = self
            .paging
            .and_then(|p| p.next)
            .map(|n| n.after)
            .filter(|after| !after.is_empty());

        Page {
            records: self.results,
            next_cursor,
        }
    }
}

/// One fetched batch of raw deals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<RawDeal>,
    /// Cursor for the following page; `None` when this is the last page
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Normalized row written to the `deals` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub deal_id: String,
    pub tenant_id: TenantId,
    pub scan_id: ScanId,
    pub extracted_at: DateTime<Utc>,

    pub deal_name: Option<String>,
    pub amount: Option<BigDecimal>,
    pub deal_stage: Option<String>,
    pub pipeline: Option<String>,
    /// Kept verbatim; HubSpot does not use one format consistently
    pub close_date: Option<String>,
    pub description: Option<String>,
    pub deal_type: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub archived: bool,

    /// Full property set exactly as received
    pub properties: Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(
        Option::<Value>::deserialize(deserializer)?,
        Some(Value::Bool(true))
    ))
}
