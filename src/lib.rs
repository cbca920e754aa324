//! Offline-first sync core for a fitness tracker client.
//!
//! Writes made while the API is unreachable are applied to a local store and
//! queued; a sync engine replays the queue once connectivity returns.
//!
//! # Examples
//!
//! Queueing and inspecting a pending write with an in-memory store:
//! ```
//! use gymsync::{
//!     core::{db::LocalDb, queue::PendingQueue},
//!     types::{Operation, StoreName},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queue = PendingQueue::new(LocalDb::in_memory());
//! queue
//!     .enqueue(
//!         StoreName::WorkoutLogs,
//!         Operation::Create,
//!         serde_json::json!({"log_date": "2024-01-15", "day_type": "Upper"}),
//!     )
//!     .await
//!     .expect("enqueue");
//! assert_eq!(queue.list_pending().await.expect("list").len(), 1);
//! # }
//! ```
//!
//! Full client with SQLite persistence and background sync:
//! ```no_run
//! use std::sync::Arc;
//!
//! use gymsync::{
//!     client::OfflineClient,
//!     core::{db::LocalDb, queue::PendingQueue},
//!     runtime::{
//!         connectivity::{ConnectivityMonitor, FixedProbe},
//!         engine::SyncEngine,
//!         handle::{spawn_sync_runtime, RuntimeConfig},
//!     },
//!     transport::http::{HttpConfig, HttpTransport},
//!     types::StoreName,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let db = LocalDb::sqlite("gymline-offline.db");
//! let queue = PendingQueue::new(db);
//! let transport = Arc::new(HttpTransport::new(HttpConfig::default()).expect("http"));
//! let monitor = ConnectivityMonitor::from_probe(&FixedProbe(true));
//!
//! let client = OfflineClient::new(queue.clone(), transport.clone());
//! let engine = Arc::new(SyncEngine::new(queue, transport, monitor.clone()));
//! let runtime = spawn_sync_runtime(engine, RuntimeConfig::default());
//!
//! let _saved = client
//!     .save(StoreName::DailyHabits, serde_json::json!({"log_date": "2024-01-15"}))
//!     .await
//!     .expect("save");
//! monitor.set_offline();
//! monitor.set_online();
//! runtime.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Offline-aware request wrapper.
pub mod client;
/// Local database handle and pending-mutation queue.
pub mod core;
/// Pending-mutation model and persisted wrapper.
pub mod op;
/// Local store abstraction with SQLite and in-memory implementations.
pub mod persist;
/// Opaque record key and field helpers.
pub mod record;
/// Store-to-endpoint table and delete-URL construction.
pub mod routes;
/// Connectivity monitor, sync engine and background runtime.
pub mod runtime;
/// Remote API transport seam.
pub mod transport;
/// Shared primitive types and enums.
pub mod types;
