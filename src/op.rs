//! Pending-mutation model and its persisted wrapper.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    record::now_ms,
    types::{Operation, RecordKey, StoreName, TimestampMs},
};

/// Version number for serialized [`StoredMutation`] rows.
pub const MUTATION_FORMAT_VERSION: u16 = 1;

/// A write that has not been confirmed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Unique queue id, also the row key in `pendingSync`.
    pub id: String,
    /// Target collection name. Kept as text so rows naming an unknown
    /// collection still load and can be dropped by the sync pass.
    pub store: String,
    /// Write kind.
    pub operation: Operation,
    /// Full entity for create/update, identifying fields for delete.
    pub data: Value,
    /// Creation time in milliseconds. Diagnostic only.
    pub timestamp: TimestampMs,
    /// Key of the optimistic local copy written with this mutation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<RecordKey>,
}

impl PendingMutation {
    /// Builds a mutation with a fresh id and the current time.
    pub fn new(store: StoreName, operation: Operation, data: Value) -> Self {
        let timestamp = now_ms();
        Self {
            id: mutation_id(store, operation, timestamp),
            store: store.as_str().to_string(),
            operation,
            data,
            timestamp,
            local_id: None,
        }
    }

    /// Attaches the key of the optimistic local copy.
    pub fn with_local_id(mut self, key: RecordKey) -> Self {
        self.local_id = Some(key);
        self
    }

    /// Resolves [`Self::store`] to a known collection.
    pub fn store_name(&self) -> Option<StoreName> {
        StoreName::parse(&self.store)
    }
}

/// Row layout written to the `pendingSync` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMutation {
    /// Row format version.
    pub format_version: u16,
    /// Wrapped mutation, flattened so `id` stays the row key.
    #[serde(flatten)]
    pub mutation: PendingMutation,
}

impl StoredMutation {
    /// Wraps `mutation` using [`MUTATION_FORMAT_VERSION`].
    pub fn new(mutation: PendingMutation) -> Self {
        Self {
            format_version: MUTATION_FORMAT_VERSION,
            mutation,
        }
    }
}

/// `<store>-<operation>-<ms>-<random>`; the suffix separates same-millisecond ids.
fn mutation_id(store: StoreName, operation: Operation, timestamp: TimestampMs) -> String {
    format!(
        "{store}-{operation}-{timestamp}-{}",
        uuid::Uuid::new_v4().simple()
    )
}

/// Decodes a `pendingSync` row.
pub fn decode_mutation(row: Value) -> Result<PendingMutation, String> {
    let versioned = row
        .as_object()
        .is_some_and(|obj| obj.contains_key("format_version"));
    if versioned {
        let stored: StoredMutation =
            serde_json::from_value(row).map_err(|e| format!("mutation decode failed: {e}"))?;
        if stored.format_version != MUTATION_FORMAT_VERSION {
            return Err(format!(
                "unsupported mutation format version: {}",
                stored.format_version
            ));
        }
        return Ok(stored.mutation);
    }

    // Rows written before the version field existed.
    serde_json::from_value::<PendingMutation>(row)
        .map_err(|e| format!("mutation decode failed: {e}"))
}
