//! Runtime event stream payloads.

/// Events emitted while draining the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A pass took its snapshot.
    PassStarted {
        /// Items in the snapshot.
        pending: usize,
    },
    /// An item was confirmed and removed from the queue.
    ItemSynced {
        /// Queue id.
        id: String,
    },
    /// An item failed and stays queued.
    ItemFailed {
        /// Queue id.
        id: String,
        /// Failure description.
        reason: String,
    },
    /// An item named a collection without an endpoint and was discarded.
    ItemDropped {
        /// Queue id.
        id: String,
        /// Unmapped collection name.
        store: String,
    },
    /// A queue row that no longer decodes was removed.
    RowDiscarded {
        /// Storage key of the row.
        key: String,
    },
    /// A pass attempted every snapshotted item.
    PassCompleted {
        /// Items still queued afterwards.
        remaining: usize,
    },
    /// A pass aborted outside the per-item loop.
    PassFailed {
        /// Failure description.
        reason: String,
    },
}
