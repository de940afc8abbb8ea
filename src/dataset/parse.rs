use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::records::{Dataset, EntityRecord, TransferRecord};

const ROOT_KEYS: &[&str] = &["root", "entity", "company"];
const COUNTERPARTY_KEYS: &[&str] = &["counterparties", "suppliers", "whitelist", "nodes"];
const TRANSFER_KEYS: &[&str] = &["transfers", "payments", "links"];

#[derive(Clone, Debug, Deserialize)]
struct RawEntity {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, alias = "label", deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "totalPaid", deserialize_with = "lenient_amount")]
    amount: f64,
    #[serde(default, alias = "recipient")]
    address: Option<String>,
    #[serde(default)]
    approved: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawTransfer {
    #[serde(default, alias = "source", deserialize_with = "lenient_string")]
    from: String,
    #[serde(default, alias = "target", alias = "recipient", deserialize_with = "lenient_string")]
    to: String,
    #[serde(default, alias = "value", deserialize_with = "lenient_amount")]
    amount: f64,
    #[serde(default, alias = "time", deserialize_with = "lenient_timestamp")]
    timestamp: i64,
    #[serde(default, alias = "type")]
    kind: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

/// Amounts arrive as numbers or as decimal strings (token balances). Anything
/// unusable, negative or non-finite degrades to zero.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value))
}

fn amount_from_value(value: &Value) -> f64 {
    let amount = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(timestamp_from_value(&value))
}

fn timestamp_from_value(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
            .unwrap_or(0)
            .max(0),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(millis) = text.parse::<i64>() {
                return millis.max(0);
            }
            DateTime::parse_from_rfc3339(text)
                .map(|parsed| parsed.timestamp_millis().max(0))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn first_present<'a>(object: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn entity_from_raw(raw: RawEntity) -> Option<EntityRecord> {
    if raw.id.is_empty() {
        return None;
    }

    let kind = match (raw.kind, raw.approved) {
        (Some(kind), _) => Some(kind),
        (None, Some(true)) => Some("approved".to_owned()),
        (None, Some(false)) => Some("pending".to_owned()),
        (None, None) => None,
    };

    Some(EntityRecord {
        id: raw.id,
        name: raw.name,
        kind,
        category: raw.category.filter(|category| !category.trim().is_empty()),
        amount: raw.amount,
        address: raw.address.filter(|address| !address.trim().is_empty()),
    })
}

fn transfer_from_raw(raw: RawTransfer) -> Option<TransferRecord> {
    if raw.from.is_empty() || raw.to.is_empty() {
        return None;
    }

    Some(TransferRecord {
        from: raw.from,
        to: raw.to,
        amount: raw.amount,
        timestamp_ms: raw.timestamp,
        kind: raw.kind,
    })
}

/// Parses a dataset document. Only a syntactically broken document or a
/// non-object top level is an error; individual records that cannot be read
/// are skipped and counted in [`Dataset::unreadable_records`].
pub fn parse_dataset(raw: &str) -> Result<Dataset> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON in dataset")?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("dataset must be a JSON object with root/counterparties/transfers"))?;

    let mut dataset = Dataset::default();

    if let Some(root_value) = first_present(object, ROOT_KEYS) {
        match RawEntity::deserialize(root_value).ok().and_then(entity_from_raw) {
            Some(root) => dataset.root = Some(root),
            None => dataset.unreadable_records += 1,
        }
    }

    if let Some(Value::Array(entries)) = first_present(object, COUNTERPARTY_KEYS) {
        dataset.counterparties.reserve(entries.len());
        for value in entries {
            match RawEntity::deserialize(value).ok().and_then(entity_from_raw) {
                Some(entity) => dataset.counterparties.push(entity),
                None => dataset.unreadable_records += 1,
            }
        }
    }

    if let Some(Value::Array(entries)) = first_present(object, TRANSFER_KEYS) {
        dataset.transfers.reserve(entries.len());
        for value in entries {
            match RawTransfer::deserialize(value).ok().and_then(transfer_from_raw) {
                Some(transfer) => dataset.transfers.push(transfer),
                None => dataset.unreadable_records += 1,
            }
        }
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_numeric_amounts() {
        let dataset = parse_dataset(
            r#"{
                "root": {"id": "company", "name": "Your Company"},
                "counterparties": [{"id": "s1", "name": "Tech Solutions", "category": "Technology"}],
                "transfers": [
                    {"from": "company", "to": "s1", "amount": "18.5", "timestamp": 1700000000000},
                    {"from": "company", "to": "s1", "amount": 2, "timestamp": "1700000001000"}
                ]
            }"#,
        )
        .expect("dataset parses");

        assert_eq!(dataset.root_id(), Some("company"));
        assert_eq!(dataset.counterparties.len(), 1);
        assert_eq!(dataset.transfers[0].amount, 18.5);
        assert_eq!(dataset.transfers[1].amount, 2.0);
        assert_eq!(dataset.transfers[1].timestamp_ms, 1_700_000_001_000);
        assert_eq!(dataset.unreadable_records, 0);
    }

    #[test]
    fn malformed_fields_degrade_to_defaults() {
        let dataset = parse_dataset(
            r#"{
                "root": {"id": "hq"},
                "counterparties": [
                    {"id": "a", "amount": "not a number"},
                    {"id": "b", "amount": -40},
                    {"name": "no id"},
                    42
                ],
                "transfers": [
                    {"from": "hq", "to": "a", "amount": null, "timestamp": "2024-05-01T10:00:00Z"},
                    {"from": "hq"}
                ]
            }"#,
        )
        .expect("dataset parses");

        assert_eq!(dataset.counterparties.len(), 2);
        assert_eq!(dataset.counterparties[0].amount, 0.0);
        assert_eq!(dataset.counterparties[1].amount, 0.0);
        assert_eq!(dataset.transfers.len(), 1);
        assert_eq!(dataset.transfers[0].amount, 0.0);
        assert!(dataset.transfers[0].timestamp_ms > 0);
        assert_eq!(dataset.unreadable_records, 3);
    }

    #[test]
    fn accepts_escrow_style_aliases() {
        let dataset = parse_dataset(
            r#"{
                "entity": {"id": "staker", "label": "VC/LP", "type": "staker"},
                "whitelist": [
                    {"id": "r1", "label": "Cloud Services Ltd", "approved": true},
                    {"id": "r2", "label": "Office Supplies Co", "approved": false}
                ],
                "payments": [{"source": "staker", "target": "r1", "value": 3.5}]
            }"#,
        )
        .expect("dataset parses");

        assert_eq!(dataset.root.as_ref().and_then(|r| r.kind.as_deref()), Some("staker"));
        assert_eq!(dataset.counterparties[0].kind.as_deref(), Some("approved"));
        assert_eq!(dataset.counterparties[1].kind.as_deref(), Some("pending"));
        assert_eq!(dataset.transfers[0].to, "r1");
        assert_eq!(dataset.transfers[0].amount, 3.5);
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(parse_dataset("[1, 2, 3]").is_err());
        assert!(parse_dataset("{ not json").is_err());
    }
}
