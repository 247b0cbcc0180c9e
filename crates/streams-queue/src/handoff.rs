//! The shared bounded handoff queue.
//!
//! One mutex guards the buffer and the closed flag. Two condition variables
//! park threads: poppers wait on `not_empty`, pushers wait on `not_full`.
//! Holders share the queue through `Arc`; the last holder to drop it frees
//! whatever is still buffered.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{PopError, PushError};

/// What `push` does when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPolicy {
    /// Wait until a pop frees a slot.
    #[default]
    Block,

    /// Return `PushError::Full` immediately.
    FailFast,
}

struct Inner<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

/// Bounded FIFO queue shared between one producer and any number of consumers.
pub struct BoundedHandoffQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: PushPolicy,
}

impl<T> BoundedHandoffQueue<T> {
    /// Create a queue with a blocking push policy.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, PushPolicy::Block)
    }

    /// Create a queue with an explicit push policy.
    pub fn with_policy(capacity: usize, policy: PushPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                buffer: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Append an item to the tail.
    ///
    /// Under `PushPolicy::Block` this waits for space; under
    /// `PushPolicy::FailFast` a full queue yields `PushError::Full`.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        match self.policy {
            PushPolicy::Block => self.push_until(item, None),
            PushPolicy::FailFast => self.push_until(item, Some(Instant::now())),
        }
    }

    /// Append an item, waiting at most `timeout` for space.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.push_until(item, deadline_after(timeout))
    }

    fn push_until(&self, item: T, deadline: Option<Instant>) -> Result<(), PushError<T>> {
        let mut inner = self.inner.lock();

        loop {
            if inner.closed {
                return Err(PushError::Closed(item));
            }

            if inner.buffer.len() < self.capacity {
                inner.buffer.push_back(item);
                trace!(len = inner.buffer.len(), "Pushed item");
                drop(inner);
                self.not_empty.notify_one();
                return Ok(());
            }

            match deadline {
                None => self.not_full.wait(&mut inner),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(PushError::Full(item));
                    }
                    self.not_full.wait_until(&mut inner, deadline);
                }
            }
        }
    }

    /// Remove the head element, waiting up to `timeout` for one to arrive.
    ///
    /// A zero timeout polls without blocking.
    pub fn pop(&self, timeout: Duration) -> Result<T, PopError> {
        let deadline = deadline_after(timeout);
        let mut inner = self.inner.lock();

        loop {
            if let Some(item) = inner.buffer.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(item);
            }

            // Closed and drained is a normal end of stream.
            if inner.closed {
                return Err(PopError::Closed);
            }

            match deadline {
                None => self.not_empty.wait(&mut inner),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(PopError::Timeout);
                    }
                    self.not_empty.wait_until(&mut inner, deadline);
                }
            }
        }
    }

    /// Remove the head element, or `None` on timeout or end of stream.
    pub fn try_pop(&self, timeout: Duration) -> Option<T> {
        self.pop(timeout).ok()
    }

    /// Mark that no further pushes will happen and wake every waiter.
    ///
    /// Buffered elements stay poppable in order.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        trace!(remaining = inner.buffer.len(), "Queue closed");
        drop(inner);

        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Check if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of buffered elements.
    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffer.is_empty()
    }

    /// Maximum number of buffered elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The configured push policy.
    pub fn policy(&self) -> PushPolicy {
        self.policy
    }
}

impl<T> std::fmt::Debug for BoundedHandoffQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedHandoffQueue")
            .field("len", &inner.buffer.len())
            .field("capacity", &self.capacity)
            .field("closed", &inner.closed)
            .field("policy", &self.policy)
            .finish()
    }
}

/// `None` means wait forever (the timeout overflowed `Instant`).
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order_across_capacities() {
        for capacity in [1usize, 2, 7, 64] {
            let queue = Arc::new(BoundedHandoffQueue::new(capacity));
            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..200u32 {
                        queue.push(i).unwrap();
                    }
                })
            };

            let received: Vec<u32> = (0..200)
                .map(|_| queue.pop(Duration::from_secs(5)).unwrap())
                .collect();
            producer.join().unwrap();

            assert_eq!(received, (0..200).collect::<Vec<_>>(), "capacity {capacity}");
        }
    }

    #[test]
    fn test_push_blocks_until_pop_frees_space() {
        let queue = Arc::new(BoundedHandoffQueue::new(2));
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        let pushed = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                queue.push(3).unwrap();
                pushed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!pushed.load(Ordering::SeqCst));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop(Duration::ZERO), Ok(1));
        producer.join().unwrap();
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(queue.pop(Duration::ZERO), Ok(2));
        assert_eq!(queue.pop(Duration::ZERO), Ok(3));
    }

    #[test]
    fn test_fail_fast_push_hands_item_back() {
        let queue = BoundedHandoffQueue::with_policy(1, PushPolicy::FailFast);
        queue.push("a").unwrap();

        let err = queue.push("b").unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), "b");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_push_timeout_expires_when_full() {
        let queue = BoundedHandoffQueue::new(1);
        queue.push(1).unwrap();

        let start = Instant::now();
        let err = queue.push_timeout(2, Duration::from_millis(50)).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 2);
    }

    #[test]
    fn test_pop_timeout_is_not_early() {
        let queue: BoundedHandoffQueue<u8> = BoundedHandoffQueue::new(4);
        let timeout = Duration::from_millis(150);

        let start = Instant::now();
        assert_eq!(queue.pop(timeout), Err(PopError::Timeout));
        let elapsed = start.elapsed();

        assert!(elapsed >= timeout, "returned after {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_millis(500), "returned after {elapsed:?}");
    }

    #[test]
    fn test_zero_timeout_polls() {
        let queue = BoundedHandoffQueue::new(4);
        assert_eq!(queue.try_pop(Duration::ZERO), None::<u8>);

        queue.push(9u8).unwrap();
        assert_eq!(queue.try_pop(Duration::ZERO), Some(9));
    }

    #[test]
    fn test_close_drains_buffered_elements_in_order() {
        let queue = BoundedHandoffQueue::new(8);
        for i in 0..3 {
            queue.push(i).unwrap();
        }
        queue.close();

        assert!(queue.is_closed());
        assert!(queue.push(99).unwrap_err().is_closed());
        assert_eq!(queue.pop(Duration::ZERO), Ok(0));
        assert_eq!(queue.pop(Duration::ZERO), Ok(1));
        assert_eq!(queue.pop(Duration::ZERO), Ok(2));
        assert_eq!(queue.pop(Duration::from_secs(1)), Err(PopError::Closed));
        assert_eq!(queue.try_pop(Duration::ZERO), None);
    }

    #[test]
    fn test_close_wakes_blocked_popper() {
        let queue: Arc<BoundedHandoffQueue<u8>> = Arc::new(BoundedHandoffQueue::new(1));
        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let start = Instant::now();
                (queue.pop(Duration::from_secs(10)), start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        let (result, elapsed) = popper.join().unwrap();
        assert_eq!(result, Err(PopError::Closed));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_close_wakes_blocked_pusher() {
        let queue = Arc::new(BoundedHandoffQueue::new(1));
        queue.push(1).unwrap();

        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        let err = pusher.join().unwrap().unwrap_err();
        assert!(err.is_closed());
        assert_eq!(err.into_inner(), 2);
        assert_eq!(queue.pop(Duration::ZERO), Ok(1));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = BoundedHandoffQueue::with_policy(0, PushPolicy::FailFast);
        assert_eq!(queue.capacity(), 1);
        queue.push(1).unwrap();
        assert!(queue.push(2).unwrap_err().is_full());
    }
}
