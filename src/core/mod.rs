//! Async local database handle and the pending-mutation queue built on it.

/// Lazily opened, cloneable store handle.
pub mod db;
/// Pending-mutation queue.
pub mod queue;
