//! Queue drain passes against the remote API.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    core::queue::PendingQueue,
    op::PendingMutation,
    routes::{delete_url, endpoint_for_store},
    transport::{ApiRequest, Transport},
    types::Operation,
};

use super::{connectivity::ConnectivityMonitor, events::SyncEvent, handle::RuntimeError};

type CompleteHook = Box<dyn Fn(&PassReport) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&RuntimeError) + Send + Sync>;

/// Notification hooks invoked once per pass. Never retried.
#[derive(Default)]
pub struct SyncHooks {
    on_complete: Option<CompleteHook>,
    on_error: Option<ErrorHook>,
}

impl SyncHooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a pass attempted every snapshotted item.
    pub fn on_complete(mut self, f: impl Fn(&PassReport) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called when a pass aborts outside the per-item loop.
    pub fn on_error(mut self, f: impl Fn(&RuntimeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Items in the snapshot.
    pub attempted: usize,
    /// Confirmed and dequeued, in attempt order.
    pub synced: Vec<String>,
    /// Left queued after a failure, in attempt order.
    pub failed: Vec<String>,
    /// Discarded because their collection has no endpoint or the row no
    /// longer decodes.
    pub dropped: Vec<String>,
    /// Queue length after the pass.
    pub remaining: usize,
}

/// Why a sync request did not start a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass is in flight.
    AlreadySyncing,
    /// The monitor reports no connectivity.
    Offline,
    /// The queue was empty; hooks and completion events are not fired.
    NothingPending,
}

/// Result of a sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A pass ran to completion.
    Completed(PassReport),
    /// No pass was started.
    Skipped(SkipReason),
}

/// Snapshot for a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    /// Connectivity as last observed.
    pub online: bool,
    /// A pass is in flight.
    pub syncing: bool,
    /// Last published pending count.
    pub pending: usize,
}

/// What an offline indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Online with nothing queued.
    Hidden,
    /// Offline; changes are kept locally.
    Offline,
    /// Online with queued changes and a sync affordance.
    Pending {
        /// Queued changes.
        count: usize,
        /// A pass is already running.
        syncing: bool,
    },
}

impl SyncStatus {
    /// Indicator state for this status.
    pub fn indicator(&self) -> Indicator {
        if !self.online {
            Indicator::Offline
        } else if self.pending > 0 {
            Indicator::Pending {
                count: self.pending,
                syncing: self.syncing,
            }
        } else {
            Indicator::Hidden
        }
    }
}

enum ItemOutcome {
    Synced,
    Dropped,
    Failed(String),
}

struct SyncingGuard<'a>(&'a AtomicBool);

impl<'a> SyncingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the pending queue, one item at a time, in insertion order.
///
/// Only one pass runs at a time; a request that arrives mid-pass is
/// answered with [`SkipReason::AlreadySyncing`] and not remembered.
pub struct SyncEngine {
    queue: PendingQueue,
    transport: Arc<dyn Transport>,
    monitor: ConnectivityMonitor,
    syncing: AtomicBool,
    events_tx: broadcast::Sender<SyncEvent>,
    hooks: SyncHooks,
}

impl SyncEngine {
    /// Engine over `queue`, replaying through `transport` while `monitor` is online.
    pub fn new(
        queue: PendingQueue,
        transport: Arc<dyn Transport>,
        monitor: ConnectivityMonitor,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        Self {
            queue,
            transport,
            monitor,
            syncing: AtomicBool::new(false),
            events_tx,
            hooks: SyncHooks::default(),
        }
    }

    /// Replaces the pass hooks.
    pub fn with_hooks(mut self, hooks: SyncHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Per-item progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// The queue being drained.
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// The connectivity source gating passes.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// True while a pass is in flight.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Current online/syncing/pending snapshot.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            online: self.monitor.is_online(),
            syncing: self.is_syncing(),
            pending: self.queue.pending_count(),
        }
    }

    /// Re-reads the queue length and publishes it.
    pub async fn refresh_pending_count(&self) -> Result<usize, RuntimeError> {
        Ok(self.queue.refresh_count().await?)
    }

    /// Runs one pass unless offline or already syncing.
    ///
    /// Item failures are reported in the [`PassReport`]; only failures outside
    /// the item loop surface as `Err`, after the error hook has run.
    pub async fn sync_now(&self) -> Result<SyncOutcome, RuntimeError> {
        if !self.monitor.is_online() {
            debug!("sync skipped: offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        let Some(_guard) = SyncingGuard::acquire(&self.syncing) else {
            debug!("sync skipped: pass already running");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        };

        match self.drain().await {
            Ok(None) => {
                debug!("sync skipped: queue empty");
                Ok(SyncOutcome::Skipped(SkipReason::NothingPending))
            }
            Ok(Some(report)) => {
                let _ = self.events_tx.send(SyncEvent::PassCompleted {
                    remaining: report.remaining,
                });
                if let Some(hook) = &self.hooks.on_complete {
                    hook(&report);
                }
                Ok(SyncOutcome::Completed(report))
            }
            Err(err) => {
                error!(%err, "sync pass failed");
                let _ = self.events_tx.send(SyncEvent::PassFailed {
                    reason: err.to_string(),
                });
                if let Some(hook) = &self.hooks.on_error {
                    hook(&err);
                }
                Err(err)
            }
        }
    }

    async fn drain(&self) -> Result<Option<PassReport>, RuntimeError> {
        let snapshot = self.queue.snapshot().await?;
        if snapshot.is_empty() {
            return Ok(None);
        }

        let pending = snapshot.items.len() + snapshot.undecodable.len();
        let mut report = PassReport::default();
        info!(count = pending, "syncing pending items");
        let _ = self.events_tx.send(SyncEvent::PassStarted { pending });

        for key in snapshot.undecodable {
            report.attempted += 1;
            let key_text = key.to_string();
            match self.queue.remove_key(key).await {
                Ok(()) => {
                    warn!(key = %key_text, "discarded undecodable queue row");
                    report.dropped.push(key_text.clone());
                    let _ = self.events_tx.send(SyncEvent::RowDiscarded { key: key_text });
                }
                Err(err) => {
                    error!(key = %key_text, %err, "undecodable queue row could not be removed");
                    report.failed.push(key_text);
                }
            }
        }

        for item in &snapshot.items {
            report.attempted += 1;
            match self.replay(item).await {
                ItemOutcome::Synced => {
                    report.synced.push(item.id.clone());
                    let _ = self.events_tx.send(SyncEvent::ItemSynced { id: item.id.clone() });
                }
                ItemOutcome::Dropped => {
                    report.dropped.push(item.id.clone());
                    let _ = self.events_tx.send(SyncEvent::ItemDropped {
                        id: item.id.clone(),
                        store: item.store.clone(),
                    });
                }
                ItemOutcome::Failed(reason) => {
                    report.failed.push(item.id.clone());
                    let _ = self.events_tx.send(SyncEvent::ItemFailed {
                        id: item.id.clone(),
                        reason,
                    });
                }
            }
        }

        report.remaining = self.queue.refresh_count().await?;
        Ok(Some(report))
    }

    async fn replay(&self, item: &PendingMutation) -> ItemOutcome {
        let Some(endpoint) = endpoint_for_store(&item.store) else {
            warn!(
                id = %item.id,
                store = %item.store,
                "no endpoint for store, dropping queued item"
            );
            return match self.queue.remove(&item.id).await {
                Ok(()) => ItemOutcome::Dropped,
                Err(err) => ItemOutcome::Failed(format!("drop failed: {err}")),
            };
        };

        let request = match item.operation {
            Operation::Create | Operation::Update => ApiRequest::post(endpoint, item.data.clone()),
            Operation::Delete => ApiRequest::delete(delete_url(endpoint, &item.data)),
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(id = %item.id, %err, "failed to sync item");
                return ItemOutcome::Failed(err.to_string());
            }
        };
        if !response.is_success() {
            error!(id = %item.id, status = response.status, "failed to sync item");
            return ItemOutcome::Failed(format!("HTTP status {}", response.status));
        }

        if let Err(err) = self.queue.remove(&item.id).await {
            // Stays queued and is replayed next pass.
            error!(id = %item.id, %err, "synced item could not be dequeued");
            return ItemOutcome::Failed(format!("dequeue failed: {err}"));
        }
        info!(id = %item.id, "synced item");

        self.apply_confirmed(item, response.body).await;
        ItemOutcome::Synced
    }

    /// Mirrors a confirmed write into the local cache and retires the
    /// optimistic copy when the server gave it a different key.
    async fn apply_confirmed(&self, item: &PendingMutation, body: Option<Value>) {
        if item.operation == Operation::Delete {
            return;
        }
        let Some(store) = item.store_name() else {
            return;
        };
        let db = self.queue.db();

        let confirmed = match body {
            Some(record @ Value::Object(_)) => match db.put(store, record).await {
                Ok(key) => Some(key),
                Err(err) => {
                    warn!(id = %item.id, %err, "could not cache confirmed record");
                    None
                }
            },
            _ => None,
        };

        if let (Some(local), Some(confirmed)) = (&item.local_id, &confirmed) {
            if local != confirmed {
                if let Err(err) = db.delete(store, local.clone()).await {
                    warn!(id = %item.id, %err, "could not remove optimistic copy");
                } else {
                    debug!(local = %local, confirmed = %confirmed, "replaced optimistic record");
                }
            }
        }
    }
}
