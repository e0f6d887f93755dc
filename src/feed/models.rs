use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Timestamp keys, in lookup order.
const TIMESTAMP_KEYS: [&str; 3] = ["timestamp", "ts", "t"];

/// Epoch values above this are taken as milliseconds (≈ year 5138 in seconds).
const EPOCH_MILLIS_THRESHOLD: f64 = 1.0e11;

/// Body of `GET /api/history`.
///
/// The backend answers with a plain array of records, or with a Firebase-style object keyed by
/// push id. `null` (or an empty body) means no data yet.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    Sequence(Vec<Value>),
    Keyed(Map<String, Value>),
    Empty,
}

impl FeedPayload {
    /// Classify a decoded JSON document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Feed` when the document is neither an array, an object nor `null`.
    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Array(items) => Ok(Self::Sequence(items)),
            Value::Object(map) => Ok(Self::Keyed(map)),
            Value::Null => Ok(Self::Empty),
            other => Err(AppError::Feed(format!(
                "unexpected history payload: expected array or object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Decode a raw response body. Blank bodies are treated as [`FeedPayload::Empty`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Feed` if the body is not JSON or has an unexpected shape.
    pub fn from_body(body: &str) -> AppResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self::Empty);
        }
        let value: Value = serde_json::from_str(body)
            .map_err(|e| AppError::Feed(format!("Failed to parse history: {e}")))?;
        Self::from_value(value)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Sequence(items) => items.is_empty(),
            Self::Keyed(map) => map.is_empty(),
            Self::Empty => true,
        }
    }

    /// Flatten into a sequence of records. Keyed payloads lose their keys; order is whatever
    /// the map yields and only becomes meaningful after sorting.
    #[must_use]
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Sequence(items) => items,
            Self::Keyed(map) => map.into_iter().map(|(_, v)| v).collect(),
            Self::Empty => Vec::new(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One timestamped record from the history feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub device_id: Option<String>,
    /// Every other key of the record, untouched. Values are interpreted at extraction time.
    pub fields: BTreeMap<String, Value>,
}

impl Reading {
    /// Build a reading from a feed record.
    ///
    /// Returns `None` when the record is not an object or carries no usable timestamp.
    #[must_use]
    pub fn from_record(record: Value) -> Option<Self> {
        let Value::Object(mut map) = record else {
            return None;
        };

        let timestamp = TIMESTAMP_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(parse_timestamp))?;
        for key in TIMESTAMP_KEYS {
            map.remove(key);
        }

        let device_id = match map.remove("device_id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Some(Self {
            timestamp,
            device_id,
            fields: map.into_iter().collect(),
        })
    }

    /// Raw value stored under `key`, if the record had that key at all.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Numeric interpretation of `key`, without any sentinel filtering.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.raw(key).and_then(coerce_number)
    }
}

/// Interpret a JSON value as a number.
///
/// Numbers pass through, numeric strings are parsed (the backend stores whatever the node sent),
/// anything else is not a number.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse the timestamp forms seen on the feed.
///
/// - RFC 3339 (`2024-01-01T00:00:00Z`, `2024-01-01T01:00:00+01:00`)
/// - naive ISO as written by Python's `isoformat()`, taken as UTC
/// - epoch seconds or milliseconds, as a number or a numeric string
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    s.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let millis = if epoch > EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// Response from `POST /api/cleanup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl CleanupResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status.to_lowercase().as_str(), "success" | "ok")
    }
}
