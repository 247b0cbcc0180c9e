//! Error types for queue operations.

use thiserror::Error;

/// A push that did not enqueue. The rejected item is handed back.
#[derive(Error)]
pub enum PushError<T> {
    /// The queue was at capacity (fail-fast push or timed push expired).
    #[error("Queue is full")]
    Full(T),

    /// The producer side has closed the queue.
    #[error("Queue is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recover the item that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }

    /// Check if the push failed because the queue was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Check if the push failed because of backpressure.
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl<T> std::fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// A pop that returned no element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopError {
    /// Nothing arrived before the timeout elapsed.
    #[error("Timed out waiting for an element")]
    Timeout,

    /// The queue is closed and fully drained.
    #[error("Queue is closed and drained")]
    Closed,
}
