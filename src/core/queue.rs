use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    op::{PendingMutation, StoredMutation, decode_mutation},
    persist::{PersistError, PersistResult},
    record::record_key,
    types::{Operation, RecordKey, StoreName},
};

use super::db::LocalDb;

/// Queue contents read at the start of a sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Decoded mutations in insertion order.
    pub items: Vec<PendingMutation>,
    /// Keys of rows that no longer decode.
    pub undecodable: Vec<RecordKey>,
}

impl QueueSnapshot {
    /// True when the queue held no rows at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.undecodable.is_empty()
    }
}

/// Durable, ordered log of writes the server has not confirmed.
///
/// Lives in the `pendingSync` collection of a [`LocalDb`]; replay order is
/// insertion order.
#[derive(Clone)]
pub struct PendingQueue {
    db: LocalDb,
    count_tx: Arc<watch::Sender<usize>>,
}

impl PendingQueue {
    /// Queue backed by `db`. The count starts at 0 until the first refresh.
    pub fn new(db: LocalDb) -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            db,
            count_tx: Arc::new(count_tx),
        }
    }

    /// Store holding the queue.
    pub fn db(&self) -> &LocalDb {
        &self.db
    }

    /// Persists a new mutation and returns it.
    pub async fn enqueue(
        &self,
        store: StoreName,
        operation: Operation,
        data: Value,
    ) -> PersistResult<PendingMutation> {
        self.push(PendingMutation::new(store, operation, data)).await
    }

    /// Like [`Self::enqueue`], recording the key of the optimistic local copy.
    pub async fn enqueue_with_local_id(
        &self,
        store: StoreName,
        operation: Operation,
        data: Value,
        local_id: RecordKey,
    ) -> PersistResult<PendingMutation> {
        self.push(PendingMutation::new(store, operation, data).with_local_id(local_id))
            .await
    }

    /// Persists an already built mutation, e.g. one restored from an export.
    pub async fn push(&self, mutation: PendingMutation) -> PersistResult<PendingMutation> {
        let row = serde_json::to_value(StoredMutation::new(mutation.clone()))?;
        self.db.put(StoreName::PendingSync, row).await?;
        debug!(
            id = %mutation.id,
            store = %mutation.store,
            op = %mutation.operation,
            "queued mutation"
        );
        self.refresh_count_logged().await;
        Ok(mutation)
    }

    /// Every queued mutation in insertion order.
    ///
    /// Rows that no longer decode are skipped with a warning.
    pub async fn list_pending(&self) -> PersistResult<Vec<PendingMutation>> {
        Ok(self.snapshot().await?.items)
    }

    /// Decoded mutations plus the keys of rows that fail to decode.
    pub async fn snapshot(&self) -> PersistResult<QueueSnapshot> {
        let rows = self.db.get_all(StoreName::PendingSync).await?;
        let mut out = QueueSnapshot {
            items: Vec::with_capacity(rows.len()),
            undecodable: Vec::new(),
        };
        for row in rows {
            let key = record_key(&row).ok().flatten();
            match decode_mutation(row) {
                Ok(m) => out.items.push(m),
                Err(err) => {
                    warn!(%err, "skipping undecodable queue row");
                    out.undecodable.extend(key);
                }
            }
        }
        Ok(out)
    }

    /// Deletes one mutation by queue id.
    pub async fn remove(&self, id: &str) -> PersistResult<()> {
        self.remove_key(RecordKey::from(id)).await
    }

    /// Deletes one queue row by its storage key.
    ///
    /// Only the delete can fail the call. A failed count refresh afterwards is
    /// logged and leaves the previously published count in place; the same
    /// holds for [`Self::push`].
    pub async fn remove_key(&self, key: RecordKey) -> PersistResult<()> {
        self.db.delete(StoreName::PendingSync, key).await?;
        self.refresh_count_logged().await;
        Ok(())
    }

    /// Empties the queue unconditionally.
    pub async fn clear(&self) -> PersistResult<()> {
        self.db.clear(StoreName::PendingSync).await?;
        self.count_tx.send_replace(0);
        Ok(())
    }

    /// Number of queued rows, read from storage. Includes rows that no
    /// longer decode until a sync pass discards them.
    pub async fn len(&self) -> PersistResult<usize> {
        self.db.count(StoreName::PendingSync).await
    }

    /// True when nothing is queued.
    pub async fn is_empty(&self) -> PersistResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Recomputes the pending count and publishes it.
    pub async fn refresh_count(&self) -> Result<usize, PersistError> {
        let n = self.len().await?;
        self.count_tx.send_replace(n);
        Ok(n)
    }

    async fn refresh_count_logged(&self) {
        if let Err(err) = self.refresh_count().await {
            warn!(%err, "could not refresh pending count");
        }
    }

    /// Last published pending count.
    pub fn pending_count(&self) -> usize {
        *self.count_tx.borrow()
    }

    /// Receiver notified whenever the pending count is republished.
    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }
}
