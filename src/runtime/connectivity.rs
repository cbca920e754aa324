//! Online/offline state as an observable value.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Platform signal the monitor seeds itself from.
pub trait ConnectivityProbe: Send + Sync {
    /// Current reachability as reported by the platform.
    fn is_online(&self) -> bool;
}

/// Probe that always reports the same state.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

impl ConnectivityProbe for FixedProbe {
    fn is_online(&self) -> bool {
        self.0
    }
}

/// Current reachability plus transition notifications.
///
/// Updates are applied synchronously; there is no debounce. Setting the
/// current state again does not wake subscribers.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Monitor starting in `online`.
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Monitor seeded from the platform signal rather than assumed online.
    pub fn from_probe(probe: &dyn ConnectivityProbe) -> Self {
        Self::new(probe.is_online())
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a transition to reachable.
    pub fn set_online(&self) -> bool {
        self.set(true)
    }

    /// Records a transition to unreachable.
    pub fn set_offline(&self) -> bool {
        self.set(false)
    }

    /// Re-reads the platform signal.
    pub fn refresh_from(&self, probe: &dyn ConnectivityProbe) -> bool {
        self.set(probe.is_online())
    }

    /// Sets the state; returns true when it changed.
    pub fn set(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == online {
                return false;
            }
            *state = online;
            true
        });
        if changed {
            info!(online, "connectivity changed");
        }
        changed
    }

    /// Receiver woken on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
