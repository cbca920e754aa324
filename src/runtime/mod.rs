//! Connectivity tracking, queue drain engine and its background task.

/// Online/offline observable.
pub mod connectivity;
/// Drain pass implementation.
pub mod engine;
/// Event stream types emitted by the engine.
pub mod events;
/// Background task and handle.
pub mod handle;
