//! Shared primitive keys and enums for tracked collections.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Unix timestamp in milliseconds.
pub type TimestampMs = u64;

/// Local collection name. One per tracked entity type, plus the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreName {
    /// Daily habit logs, keyed by `log_date` on the server.
    DailyHabits,
    /// Exercise set logs.
    ExerciseLogs,
    /// Exercise catalogue.
    Exercises,
    /// Food-quality checklists.
    FoodQuality,
    /// Workout logs.
    WorkoutLogs,
    /// Workout plans.
    WorkoutPlans,
    /// Body measurements. Cached locally but never replayed.
    BodyMeasurements,
    /// Pending-mutation queue.
    PendingSync,
}

impl StoreName {
    /// Every collection, in schema creation order.
    pub const ALL: [StoreName; 8] = [
        StoreName::DailyHabits,
        StoreName::ExerciseLogs,
        StoreName::Exercises,
        StoreName::FoodQuality,
        StoreName::WorkoutLogs,
        StoreName::WorkoutPlans,
        StoreName::BodyMeasurements,
        StoreName::PendingSync,
    ];

    /// Persisted collection name.
    pub fn as_str(self) -> &'static str {
        match self {
            StoreName::DailyHabits => "dailyHabits",
            StoreName::ExerciseLogs => "exerciseLogs",
            StoreName::Exercises => "exercises",
            StoreName::FoodQuality => "foodQuality",
            StoreName::WorkoutLogs => "workoutLogs",
            StoreName::WorkoutPlans => "workoutPlans",
            StoreName::BodyMeasurements => "bodyMeasurements",
            StoreName::PendingSync => "pendingSync",
        }
    }

    /// Looks up a collection by its persisted name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Entity collections get auto-increment keys; the queue does not.
    pub fn auto_increment(self) -> bool {
        self != StoreName::PendingSync
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of queued write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Insert a new record.
    Create,
    /// Replace an existing record.
    Update,
    /// Remove a record.
    Delete,
}

impl Operation {
    /// Lower-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb used by the request wrapper and the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Create or upsert.
    Post,
    /// Replace.
    Put,
    /// Remove.
    Delete,
}

impl Method {
    /// Upper-case verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key of a locally stored record.
///
/// Integer and text keys are distinct: `5` and `"5"` address different rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    /// Server-assigned or auto-increment id.
    Int(i64),
    /// Natural or temporary key.
    Text(String),
}

impl RecordKey {
    /// JSON form, as written into a record's `id` field.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RecordKey::Int(v) => serde_json::Value::from(*v),
            RecordKey::Text(v) => serde_json::Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(v) => write!(f, "{v}"),
            RecordKey::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl ToSql for RecordKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            RecordKey::Int(v) => Ok(ToSqlOutput::from(*v)),
            RecordKey::Text(v) => Ok(ToSqlOutput::from(v.as_str())),
        }
    }
}

impl FromSql for RecordKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(RecordKey::Int(v)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| RecordKey::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
