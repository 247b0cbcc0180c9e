//! Bounded producer/consumer handoff queue.
//!
//! This crate provides the shared queue that decouples a network-receiving
//! producer thread from any number of consumers, plus a consumer-only handle
//! that hides the producer side.

mod error;
mod handoff;
mod receiver;

pub use error::{PopError, PushError};
pub use handoff::{BoundedHandoffQueue, PushPolicy};
pub use receiver::ReceiverQueue;

/// Default capacity for packet handoff queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
