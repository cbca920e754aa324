//! Volatile in-memory store with the same contract as the SQLite one.

use hashbrown::HashMap;
use serde_json::Value;

use crate::{
    record::{record_key, set_record_key},
    types::{RecordKey, StoreName},
};

use super::{LocalStore, PersistError, PersistResult};

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    record: Value,
}

#[derive(Debug, Clone, Default)]
struct Collection {
    rows: HashMap<RecordKey, Slot>,
    next_seq: u64,
    next_auto: i64,
}

impl Collection {
    fn upsert(&mut self, store: StoreName, mut record: Value) -> PersistResult<RecordKey> {
        let key = match record_key(&record)? {
            Some(key) => key,
            None if store.auto_increment() => {
                let key = RecordKey::Int(self.next_auto.max(0) + 1);
                set_record_key(&mut record, &key)?;
                key
            }
            None => return Err(PersistError::MissingKey(store)),
        };

        if let RecordKey::Int(v) = key {
            self.next_auto = self.next_auto.max(v);
        }

        match self.rows.get_mut(&key) {
            Some(slot) => slot.record = record,
            None => {
                self.next_seq += 1;
                self.rows.insert(
                    key.clone(),
                    Slot {
                        seq: self.next_seq,
                        record,
                    },
                );
            }
        }
        Ok(key)
    }

    fn ordered(&self) -> Vec<Value> {
        let mut slots: Vec<&Slot> = self.rows.values().collect();
        slots.sort_by_key(|s| s.seq);
        slots.into_iter().map(|s| s.record.clone()).collect()
    }
}

/// [`LocalStore`] kept entirely in memory. Nothing survives a drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<StoreName, Collection>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn len(&self, store: StoreName) -> usize {
        self.collections.get(&store).map_or(0, |c| c.rows.len())
    }

    /// True when a collection holds no records.
    pub fn is_empty(&self, store: StoreName) -> bool {
        self.len(store) == 0
    }
}

impl LocalStore for MemoryStore {
    fn get_all(&self, store: StoreName) -> PersistResult<Vec<Value>> {
        Ok(self
            .collections
            .get(&store)
            .map(Collection::ordered)
            .unwrap_or_default())
    }

    fn get(&self, store: StoreName, key: &RecordKey) -> PersistResult<Option<Value>> {
        Ok(self
            .collections
            .get(&store)
            .and_then(|c| c.rows.get(key))
            .map(|s| s.record.clone()))
    }

    fn put(&mut self, store: StoreName, record: Value) -> PersistResult<RecordKey> {
        self.collections.entry(store).or_default().upsert(store, record)
    }

    fn put_many(&mut self, store: StoreName, records: Vec<Value>) -> PersistResult<Vec<RecordKey>> {
        // Stage on a copy so a bad record leaves the collection as it was.
        let mut staged = self.collections.get(&store).cloned().unwrap_or_default();
        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            keys.push(staged.upsert(store, record)?);
        }
        self.collections.insert(store, staged);
        Ok(keys)
    }

    fn count(&self, store: StoreName) -> PersistResult<usize> {
        Ok(self.len(store))
    }

    fn delete(&mut self, store: StoreName, key: &RecordKey) -> PersistResult<()> {
        if let Some(c) = self.collections.get_mut(&store) {
            c.rows.remove(key);
        }
        Ok(())
    }

    fn clear(&mut self, store: StoreName) -> PersistResult<()> {
        if let Some(c) = self.collections.get_mut(&store) {
            c.rows.clear();
        }
        Ok(())
    }
}
