//! Consumer-only handle to a shared handoff queue.

use std::sync::Arc;
use std::time::Duration;

use crate::error::PopError;
use crate::handoff::BoundedHandoffQueue;

/// Grants a consumer stake in a shared handoff queue.
///
/// Clones share the same underlying queue and compete for its elements.
/// The handle cannot push or close.
pub struct ReceiverQueue<T> {
    queue: Arc<BoundedHandoffQueue<T>>,
}

impl<T> ReceiverQueue<T> {
    /// Take a share of the given queue.
    pub fn new(queue: Arc<BoundedHandoffQueue<T>>) -> Self {
        Self { queue }
    }

    /// Remove the oldest element, waiting up to `timeout` if empty.
    pub fn try_pop(&self, timeout: Duration) -> Option<T> {
        self.queue.try_pop(timeout)
    }

    /// Like `try_pop`, but tells a timeout apart from end of stream.
    pub fn pop(&self, timeout: Duration) -> Result<T, PopError> {
        self.queue.pop(timeout)
    }

    /// Check if the producer has closed the queue.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl<T> Clone for ReceiverQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> std::fmt::Debug for ReceiverQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReceiverQueue").field(&self.queue).finish()
    }
}
