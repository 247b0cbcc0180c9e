//! Flat adapter boundary for non-native callers and pipeline elements.
//!
//! This crate exposes four operations over the transport crate
//! (create-sender, send, create-receiver, receive) that take one flat
//! options record and report failures as a status code plus message.

mod handles;
mod source;
mod status;
mod types;

pub use handles::{
    create_receiver, create_receiver_with_factory, create_sender, create_sender_with_factory,
    receive, send, StreamReceiver, StreamSender,
};
pub use source::{CapsTracker, PacketSource};
pub use status::{Status, StatusCode};
pub use streams_transport::{Packet, PacketHeader};
pub use types::{SourceBuffer, StreamOptions};

/// Default server address.
pub const DEFAULT_TARGET_ADDRESS: &str = streams_transport::DEFAULT_TARGET_ADDRESS;

/// Default wait for one receive, in milliseconds.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5_000;
