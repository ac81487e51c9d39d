use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Map, Value as Json};

use crate::error::{CodecError, CodecResult};

/// Structural wire value exchanged with the ledger.
///
/// Mirrors [`crate::Type`] one to one. Values are only produced by
/// schema-checked conversions, so a `Value` handed to the ledger always
/// conforms to the schema it was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int64(i64),
    /// Decimal literal, validated against the declared scale.
    Numeric(String),
    Text(String),
    Party(String),
    ContractId(String),
    /// Microseconds since the Unix epoch, UTC.
    Timestamp(i64),
    /// Days since the Unix epoch.
    Date(i32),
    Optional(Option<Box<Value>>),
    List(Vec<Value>),
    TextMap(BTreeMap<String, Value>),
    /// Fields in schema declaration order.
    Record(Vec<(String, Value)>),
    Variant { constructor: String, value: Box<Value> },
    Enum(String),
}

impl Value {
    pub fn some(value: Value) -> Self {
        Self::Optional(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Self::Optional(None)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn party(s: impl Into<String>) -> Self {
        Self::Party(s.into())
    }

    pub fn contract_id(s: impl Into<String>) -> Self {
        Self::ContractId(s.into())
    }

    /// Look up a record field by label.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_contract_id(&self) -> Option<&str> {
        match self {
            Self::ContractId(cid) => Some(cid),
            _ => None,
        }
    }

    /// Encode in the JSON Ledger API dialect.
    ///
    /// Int64 values are rendered as decimal strings so that clients with
    /// 53-bit number parsers do not lose precision. Nested optionals use the
    /// list convention: `Some(None)` is `[]` and `Some(Some(x))` is `[x]`.
    /// Timestamps and dates outside the representable calendar range fail
    /// with [`CodecError::InvalidValue`].
    pub fn to_ledger_json(&self) -> CodecResult<Json> {
        self.ledger_json_at("$")
    }

    fn ledger_json_at(&self, path: &str) -> CodecResult<Json> {
        Ok(match self {
            Self::Unit => json!({}),
            Self::Bool(b) => Json::Bool(*b),
            Self::Int64(i) => Json::String(i.to_string()),
            Self::Numeric(n) => Json::String(n.clone()),
            Self::Text(s) | Self::Party(s) | Self::ContractId(s) | Self::Enum(s) => {
                Json::String(s.clone())
            }
            Self::Timestamp(micros) => Json::String(
                format_timestamp(*micros).ok_or_else(|| out_of_range(path, "timestamp"))?,
            ),
            Self::Date(days) => {
                Json::String(format_date(*days).ok_or_else(|| out_of_range(path, "date"))?)
            }
            Self::Optional(None) => Json::Null,
            Self::Optional(Some(inner)) => match inner.as_ref() {
                Self::Optional(None) => json!([]),
                nested @ Self::Optional(Some(_)) => {
                    Json::Array(vec![nested.ledger_json_at(&format!("{path}[0]"))?])
                }
                other => other.ledger_json_at(path)?,
            },
            Self::List(items) => Json::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v.ledger_json_at(&format!("{path}[{i}]")))
                    .collect::<CodecResult<_>>()?,
            ),
            Self::TextMap(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.ledger_json_at(&format!("{path}.{k}"))?)))
                    .collect::<CodecResult<_>>()?,
            ),
            Self::Record(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (name, value) in fields {
                    map.insert(name.clone(), value.ledger_json_at(&format!("{path}.{name}"))?);
                }
                Json::Object(map)
            }
            Self::Variant { constructor, value } => json!({
                "tag": constructor,
                "value": value.ledger_json_at(&format!("{path}.{constructor}"))?,
            }),
        })
    }
}

fn out_of_range(path: &str, what: &str) -> CodecError {
    CodecError::InvalidValue {
        path: path.to_string(),
        reason: format!("{what} out of range"),
    }
}

pub(crate) fn format_timestamp(micros: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<i64, String> {
    let ts = DateTime::parse_from_rfc3339(s).map_err(|e| e.to_string())?;
    if ts.timestamp_subsec_nanos() % 1_000 != 0 {
        return Err("timestamps carry at most microsecond precision".into());
    }
    Ok(ts.timestamp_micros())
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

pub(crate) fn format_date(days: i32) -> Option<String> {
    epoch()
        .checked_add_signed(chrono::Duration::days(days.into()))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

pub(crate) fn parse_date(s: &str) -> Result<i32, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())?;
    i32::try_from(date.signed_duration_since(epoch()).num_days())
        .map_err(|_| "date out of range".to_string())
}
