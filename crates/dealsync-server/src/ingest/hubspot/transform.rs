//! Raw deal → warehouse row mapping
//!
//! [`transform`] is pure and total: malformed typed fields become `None`
//! instead of failing the batch. Values PostgreSQL cannot store count as
//! malformed too.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, Utc};
use dealsync_common::types::{ScanId, TenantId};
use serde_json::{Map, Value};
use std::str::FromStr;

use super::models::{DealRecord, RawDeal};

/// `NUMERIC` limits: digits before and after the decimal point
const NUMERIC_MAX_INTEGER_DIGITS: i64 = 131_072;
const NUMERIC_MAX_SCALE: i64 = 16_383;

/// First full year `TIMESTAMPTZ` can hold (4713 BC). chrono's own ceiling
/// sits below the PostgreSQL one.
const TIMESTAMP_MIN_YEAR: i32 = -4712;

pub fn transform(
    raw: &RawDeal,
    scan_id: &ScanId,
    tenant_id: &TenantId,
    extracted_at: DateTime<Utc>,
) -> DealRecord {
    let props = &raw.properties;

    DealRecord {
        deal_id: raw.id.clone(),
        tenant_id: tenant_id.clone(),
        scan_id: scan_id.clone(),
        extracted_at,

        deal_name: text(props, "dealname"),
        amount: decimal(props, "amount"),
        deal_stage: text(props, "dealstage"),
        pipeline: text(props, "pipeline"),
        close_date: text(props, "closedate"),
        description: text(props, "description"),
        deal_type: text(props, "dealtype"),

        created_at: epoch_millis(props, "createdate"),
        updated_at: epoch_millis(props, "hs_lastmodifieddate"),
        archived: raw.archived,

        properties: props.clone(),
    }
}

fn text(props: &Map<String, Value>, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal(props: &Map<String, Value>, key: &str) -> Option<BigDecimal> {
    let raw = text(props, key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = BigDecimal::from_str(trimmed).ok()?;
    if fits_numeric(&value) {
        return Some(value);
    }
    let normalized = value.normalized();
    fits_numeric(&normalized).then_some(normalized)
}

fn fits_numeric(value: &BigDecimal) -> bool {
    let (_, exponent) = value.as_bigint_and_exponent();
    let integer_digits = (value.digits() as i64).saturating_sub(exponent);
    exponent <= NUMERIC_MAX_SCALE && integer_digits <= NUMERIC_MAX_INTEGER_DIGITS
}

fn epoch_millis(props: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let millis = match props.get(key)? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let ts = DateTime::from_timestamp_millis(millis)?;
    (ts.year() >= TIMESTAMP_MIN_YEAR).then_some(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(id: &str, properties: Value) -> RawDeal {
        RawDeal {
            id: id.to_string(),
            properties: properties.as_object().cloned().unwrap_or_default(),
            archived: false,
        }
    }

    fn extracted_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_full_record_mapping() {
        let deal = raw(
            "987",
            json!({
                "dealname": "Renewal",
                "amount": "1250.50",
                "dealstage": "closedwon",
                "pipeline": "default",
                "closedate": "2024-03-01T00:00:00.000Z",
                "createdate": "1700000000000",
                "hs_lastmodifieddate": "1700000360000",
                "description": "Annual plan",
                "dealtype": "existingbusiness"
            }),
        );
        let scan = ScanId::from("scan-1");
        let tenant = TenantId::new("t1").unwrap();

        let record = transform(&deal, &scan, &tenant, extracted_at());

        assert_eq!(record.deal_id, "987");
        assert_eq!(record.scan_id, scan);
        assert_eq!(record.tenant_id, tenant);
        assert_eq!(record.extracted_at, extracted_at());
        assert_eq!(record.deal_name.as_deref(), Some("Renewal"));
        assert_eq!(record.amount, Some(BigDecimal::from_str("1250.50").unwrap()));
        assert_eq!(record.deal_stage.as_deref(), Some("closedwon"));
        assert_eq!(record.pipeline.as_deref(), Some("default"));
        assert_eq!(record.close_date.as_deref(), Some("2024-03-01T00:00:00.000Z"));
        assert_eq!(record.description.as_deref(), Some("Annual plan"));
        assert_eq!(record.deal_type.as_deref(), Some("existingbusiness"));
        assert_eq!(record.created_at, DateTime::from_timestamp_millis(1_700_000_000_000));
        assert_eq!(record.updated_at, DateTime::from_timestamp_millis(1_700_000_360_000));
        assert!(!record.archived);
    }

    #[test]
    fn test_malformed_typed_fields_are_omitted() {
        let deal = raw(
            "1",
            json!({
                "amount": "twelve",
                "createdate": "2024-01-01",
                "hs_lastmodifieddate": null
            }),
        );

        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());

        assert_eq!(record.amount, None);
        assert_eq!(record.created_at, None);
        assert_eq!(record.updated_at, None);
    }

    #[test]
    fn test_empty_amount_is_omitted() {
        let deal = raw("1", json!({"amount": "  "}));
        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
        assert_eq!(record.amount, None);
    }

    #[test]
    fn test_numeric_json_values_are_accepted() {
        let deal = raw("1", json!({"amount": 99.5, "createdate": 1_700_000_000_000i64}));
        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
        assert_eq!(record.amount, Some(BigDecimal::from_str("99.5").unwrap()));
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_amount_outside_numeric_range_is_omitted() {
        for amount in ["1e200000", "1e-200000", "1e-9000000000", "-1e131072"] {
            let deal = raw("1", json!({ "amount": amount }));
            let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
            assert_eq!(record.amount, None, "amount {amount}");
        }
    }

    #[test]
    fn test_amount_at_numeric_edges_is_kept() {
        let deal = raw("1", json!({"amount": "1e131071"}));
        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
        assert!(record.amount.is_some());

        // Trailing zeros past the scale limit collapse to a storable value
        let padded = format!("2.5{}", "0".repeat(20_000));
        let deal = raw("1", json!({ "amount": padded }));
        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
        assert_eq!(record.amount, Some(BigDecimal::from_str("2.5").unwrap()));
    }

    #[test]
    fn test_timestamp_before_postgres_range_is_omitted() {
        let earliest = Utc
            .with_ymd_and_hms(-4712, 1, 1, 0, 0, 0)
            .unwrap()
            .timestamp_millis();
        let deal = raw(
            "1",
            json!({
                "createdate": "-1000000000000000",
                "hs_lastmodifieddate": (earliest - 1).to_string()
            }),
        );
        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
        assert_eq!(record.created_at, None);
        assert_eq!(record.updated_at, None);

        let deal = raw("1", json!({ "createdate": earliest }));
        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());
        assert_eq!(record.created_at, DateTime::from_timestamp_millis(earliest));
    }

    #[test]
    fn test_missing_fields_and_archived_flag() {
        let mut deal = raw("55", json!({}));
        deal.archived = true;

        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());

        assert!(record.archived);
        assert!(record.deal_name.is_none());
        assert!(record.close_date.is_none());
        assert!(record.properties.is_empty());
    }

    #[test]
    fn test_property_blob_is_kept_verbatim() {
        let props = json!({
            "dealname": "X",
            "hs_custom_score": "7",
            "nested": {"a": [1, 2]},
            "amount": "not-a-number"
        });
        let deal = raw("1", props.clone());

        let record = transform(&deal, &ScanId::from("s"), &TenantId::default(), extracted_at());

        assert_eq!(Value::Object(record.properties), props);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(|f| json!(f)),
            ".{0,24}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_transform_is_total_and_deterministic(
            id in ".{0,12}",
            archived in any::<bool>(),
            props in proptest::collection::btree_map(
                prop_oneof![
                    Just("amount".to_string()),
                    Just("createdate".to_string()),
                    Just("hs_lastmodifieddate".to_string()),
                    Just("dealname".to_string()),
                    "[a-z_]{1,12}",
                ],
                arb_json(),
                0..8,
            )
        ) {
            let deal = RawDeal {
                id,
                properties: props.into_iter().collect(),
                archived,
            };
            let scan = ScanId::from("scan");
            let tenant = TenantId::default();

            let first = transform(&deal, &scan, &tenant, extracted_at());
            let second = transform(&deal, &scan, &tenant, extracted_at());

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first.properties, &deal.properties);
            prop_assert_eq!(first.archived, archived);
        }
    }
}
