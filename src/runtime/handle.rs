use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinSet,
};
use tracing::{debug, warn};

use crate::persist::PersistError;

use super::{
    engine::{SyncEngine, SyncOutcome, SyncStatus},
    events::SyncEvent,
};

/// Failure of a sync pass or of the runtime itself.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Reading the queue or publishing its count failed.
    #[error("local store error: {0}")]
    Persist(#[from] PersistError),
    /// The background task is gone.
    #[error("sync runtime stopped")]
    ChannelClosed,
}

/// Settings for [`spawn_sync_runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Run a pass immediately if the monitor starts online.
    pub sync_on_start: bool,
    /// Command channel capacity.
    pub command_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sync_on_start: true,
            command_bound: 64,
        }
    }
}

/// Cloneable handle to the background sync task.
pub struct SyncRuntime {
    cmd_tx: mpsc::Sender<Command>,
    engine: Arc<SyncEngine>,
}

impl Clone for SyncRuntime {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            engine: Arc::clone(&self.engine),
        }
    }
}

enum Command {
    SyncNow {
        resp: oneshot::Sender<Result<SyncOutcome, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts the task that drains the queue on every offline-to-online
/// transition and on [`SyncRuntime::sync_now`].
///
/// Passes run on their own tasks, so commands are answered while a pass is
/// in flight. Shutdown waits for running passes to finish.
pub fn spawn_sync_runtime(engine: Arc<SyncEngine>, config: RuntimeConfig) -> SyncRuntime {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_bound.max(1));
    let mut online_rx = engine.monitor().subscribe();
    let engine_loop = Arc::clone(&engine);

    tokio::spawn(async move {
        let engine = engine_loop;
        let mut passes = JoinSet::new();

        if let Err(err) = engine.refresh_pending_count().await {
            warn!(%err, "could not read pending count");
        }
        if config.sync_on_start && *online_rx.borrow_and_update() {
            spawn_pass(&mut passes, &engine, None);
        }

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    match cmd {
                        Command::SyncNow { resp } => spawn_pass(&mut passes, &engine, Some(resp)),
                        Command::Shutdown { resp } => {
                            while passes.join_next().await.is_some() {}
                            let _ = resp.send(());
                            return;
                        }
                    }
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *online_rx.borrow_and_update() {
                        debug!("back online, draining queue");
                        spawn_pass(&mut passes, &engine, None);
                    }
                }
                Some(_) = passes.join_next(), if !passes.is_empty() => {}
            }
        }

        while passes.join_next().await.is_some() {}
    });

    SyncRuntime { cmd_tx, engine }
}

fn spawn_pass(
    passes: &mut JoinSet<()>,
    engine: &Arc<SyncEngine>,
    resp: Option<oneshot::Sender<Result<SyncOutcome, RuntimeError>>>,
) {
    let engine = Arc::clone(engine);
    passes.spawn(async move {
        let out = engine.sync_now().await;
        match resp {
            Some(resp) => {
                let _ = resp.send(out);
            }
            None => {
                if let Ok(SyncOutcome::Completed(report)) = &out {
                    debug!(
                        synced = report.synced.len(),
                        failed = report.failed.len(),
                        remaining = report.remaining,
                        "automatic pass finished"
                    );
                }
            }
        }
    });
}

impl SyncRuntime {
    /// Per-item progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.engine.subscribe()
    }

    /// The engine driven by this runtime.
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Current online/syncing/pending snapshot.
    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    /// Requests a pass and waits for its outcome.
    pub async fn sync_now(&self) -> Result<SyncOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SyncNow { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Stops the task after in-flight passes complete.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}
