//! Local durable store abstraction.

/// In-memory implementation.
pub mod memory;
/// SQLite implementation.
pub mod sqlite;

use serde_json::Value;

use crate::{
    record::KeyError,
    types::{RecordKey, StoreName},
};

/// Current local schema version. Bump when a collection is added.
pub const SCHEMA_VERSION: u32 = 2;

/// Failure of a local storage operation.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// SQLite failure (quota, corruption, locking).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload encode/decode failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Record rejected because of its key.
    #[error("invalid record key: {0}")]
    Key(#[from] KeyError),
    /// A keyless record was written to a collection without auto-increment.
    #[error("collection `{0}` requires an `id` on every record")]
    MissingKey(StoreName),
    /// The on-disk schema is newer than this build understands.
    #[error("local schema version {found} is newer than supported {supported}")]
    SchemaTooNew {
        /// Version found on disk.
        found: u32,
        /// Highest version this build writes.
        supported: u32,
    },
    /// Anything else, e.g. a failed blocking task.
    #[error("{0}")]
    Message(String),
}

/// Result alias for store operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Per-collection keyed record storage.
///
/// Records are JSON objects keyed by their `id`. Implementations persist
/// every call before returning and keep insertion order for [`Self::get_all`].
pub trait LocalStore: Send {
    /// Every record of a collection, oldest insertion first.
    fn get_all(&self, store: StoreName) -> PersistResult<Vec<Value>>;

    /// One record by key.
    fn get(&self, store: StoreName, key: &RecordKey) -> PersistResult<Option<Value>>;

    /// Upserts a record and returns its key, assigning one if allowed.
    fn put(&mut self, store: StoreName, record: Value) -> PersistResult<RecordKey>;

    /// Upserts all records or none.
    fn put_many(&mut self, store: StoreName, records: Vec<Value>) -> PersistResult<Vec<RecordKey>>;

    /// Number of records in a collection.
    fn count(&self, store: StoreName) -> PersistResult<usize> {
        Ok(self.get_all(store)?.len())
    }

    /// Removes a record. Missing keys are not an error.
    fn delete(&mut self, store: StoreName, key: &RecordKey) -> PersistResult<()>;

    /// Removes every record of a collection.
    fn clear(&mut self, store: StoreName) -> PersistResult<()>;

    /// Schema version the store was opened at.
    fn schema_version(&self) -> u32 {
        SCHEMA_VERSION
    }
}
