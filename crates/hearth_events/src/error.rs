//! # Event Error Types

use thiserror::Error;

/// Errors raised by the event queue, the dispatcher and async publishing.
///
/// Handler failures are not errors of the bus: they are logged and counted
/// in [`DispatchOutcome`](crate::DispatchOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The queue was disposed; it accepts nothing anymore.
    #[error("event queue already disposed")]
    QueueDisposed,

    /// A bounded tier is at capacity.
    #[error("event queue tier full: capacity {capacity}")]
    QueueFull {
        /// Per-tier capacity.
        capacity: usize,
    },

    /// A dispatcher is already draining this queue.
    #[error("an event dispatcher is already running for this queue")]
    DispatcherRunning,

    /// Async handlers need a tokio runtime and none is current.
    #[error("publish_async called outside a tokio runtime")]
    RuntimeUnavailable,

    /// The dispatcher thread could not be spawned.
    #[error("failed to spawn event dispatcher: {0}")]
    DispatcherSpawn(String),
}

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;
