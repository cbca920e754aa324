//! Helpers over opaque entity records.
//!
//! Records are JSON objects whose shape belongs to the route handlers. The
//! sync core only looks at the identifying fields: `id`, `date` and `log_date`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::types::{RecordKey, TimestampMs};

/// Prefix of client-synthesized ids that the server has not confirmed yet.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Errors raised while reading a record's key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The record is not a JSON object.
    #[error("record must be a JSON object")]
    NotAnObject,
    /// The `id` field holds something that cannot be a key.
    #[error("unsupported id value: {0}")]
    UnsupportedId(String),
}

/// Reads the `id` field of `record`.
///
/// `Ok(None)` means the record has no usable id yet (missing or `null`).
pub fn record_key(record: &Value) -> Result<Option<RecordKey>, KeyError> {
    let obj = record.as_object().ok_or(KeyError::NotAnObject)?;
    match obj.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(RecordKey::Text(s.clone()))),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|v| Some(RecordKey::Int(v)))
            .ok_or_else(|| KeyError::UnsupportedId(n.to_string())),
        Some(other) => Err(KeyError::UnsupportedId(other.to_string())),
    }
}

/// Writes `key` into the record's `id` field.
pub fn set_record_key(record: &mut Value, key: &RecordKey) -> Result<(), KeyError> {
    let obj = record.as_object_mut().ok_or(KeyError::NotAnObject)?;
    obj.insert("id".to_string(), key.to_json());
    Ok(())
}

/// Synthesizes a temporary id for an optimistic local copy.
pub fn temp_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{TEMP_ID_PREFIX}{}-{}", now_ms(), &suffix[..8])
}

/// True when `key` was synthesized by [`temp_id`].
pub fn is_temp_key(key: &RecordKey) -> bool {
    matches!(key, RecordKey::Text(s) if s.starts_with(TEMP_ID_PREFIX))
}

/// Returns a copy of `body` that carries an id, synthesizing a temp id when absent.
pub fn with_local_id(body: &Value) -> Result<(Value, RecordKey), KeyError> {
    let mut out = match body {
        Value::Object(map) => Value::Object(map.clone()),
        _ => return Err(KeyError::NotAnObject),
    };
    let key = match record_key(&out)? {
        Some(key) => key,
        None => {
            let key = RecordKey::Text(temp_id());
            set_record_key(&mut out, &key)?;
            key
        }
    };
    Ok((out, key))
}

/// Textual form of a scalar identifying field.
///
/// Empty strings, zero, `false` and `null` count as absent.
pub fn field_text(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// The date-like identifying value: `date` first, then `log_date`.
pub fn date_field(record: &Value) -> Option<String> {
    let obj = record.as_object()?;
    field_text(obj, "date").or_else(|| field_text(obj, "log_date"))
}

/// The textual `id` of a record, if any.
pub fn id_field(record: &Value) -> Option<String> {
    field_text(record.as_object()?, "id")
}

/// True when a cached record answers a query scoped by `date` or `id`.
pub fn matches_scope(record: &Value, date: Option<&str>, id: Option<&str>) -> bool {
    let Some(obj) = record.as_object() else {
        return false;
    };
    if let Some(date) = date {
        let hit = ["log_date", "date"]
            .iter()
            .any(|f| obj.get(*f).and_then(Value::as_str) == Some(date));
        if hit {
            return true;
        }
    }
    if let Some(id) = id {
        return id_field(record).as_deref() == Some(id);
    }
    false
}

pub(crate) fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
