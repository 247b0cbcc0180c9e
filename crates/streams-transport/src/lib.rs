//! Packet stream client transport.
//!
//! This crate connects to a stream server over TCP or TLS, receives packets
//! from a named stream into a bounded queue on a background thread, and sends
//! acknowledged packets to a named stream.

mod channel;
pub mod codec;
mod connection;
mod error;
mod options;
mod packet;
mod receiver;
mod sender;
mod session;

pub use channel::{AsyncStream, BoxedStream, Channel, ChannelFactory};
pub use codec::ErrorCode;
pub use connection::{ReceiverState, ReceiverStatistics, SenderStatistics};
pub use error::{ChannelError, ConnectError, ReceiveError, SendError, TransportError};
pub use options::{ChannelSecurity, ConnectionOptions, ReceiverOptions, SenderOptions, SslOptions};
pub use packet::{Packet, PacketHeader};
pub use receiver::PacketReceiver;
pub use sender::PacketSender;
pub use streams_queue::ReceiverQueue;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Packets buffered per receiver.
pub const PACKET_QUEUE_CAPACITY: usize = streams_queue::DEFAULT_QUEUE_CAPACITY;

/// Server address used when none is configured.
pub const DEFAULT_TARGET_ADDRESS: &str = "localhost:50052";

/// Connect plus session setup timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Per-packet acknowledgement timeout in milliseconds.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;

/// Largest accepted frame body.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// How long the receive loop waits on a full queue before checking for shutdown.
pub const PUSH_RETRY_INTERVAL_MS: u64 = 100;
