//! The four boundary operations: create-sender, send, create-receiver,
//! receive.
//!
//! Handles are owned values. Dropping a handle tears down its session.

use std::time::Duration;

use streams_transport::{ChannelFactory, Packet, PacketReceiver, PacketSender};
use tracing::{debug, instrument};

use crate::status::Status;
use crate::types::StreamOptions;

/// An open sender.
pub struct StreamSender {
    inner: PacketSender,
}

impl StreamSender {
    /// Stream this sender writes to.
    pub fn stream_name(&self) -> &str {
        self.inner.stream_name()
    }
}

/// An open receiver.
pub struct StreamReceiver {
    inner: PacketReceiver,
    timeout: Duration,
}

impl StreamReceiver {
    /// Stream this receiver reads from.
    pub fn stream_name(&self) -> &str {
        self.inner.stream_name()
    }

    /// Wait applied by [`receive`].
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Open a sender on `options.stream_name`.
pub fn create_sender(options: &StreamOptions) -> Result<StreamSender, Status> {
    create_sender_with_factory(options, &ChannelFactory::default())
}

/// Open a sender using an explicit channel factory.
#[instrument(name = "ipc_create_sender", skip(options, factory), fields(stream = %options.stream_name))]
pub fn create_sender_with_factory(
    options: &StreamOptions,
    factory: &ChannelFactory,
) -> Result<StreamSender, Status> {
    let inner = PacketSender::create_with_factory(options.sender_options(), factory)?;
    debug!("Sender handle created");
    Ok(StreamSender { inner })
}

/// Send one packet and wait for its acknowledgement.
pub fn send(sender: &StreamSender, packet: Packet) -> Result<(), Status> {
    sender.inner.send(packet).map_err(Status::from)
}

/// Open a receiver on `options.stream_name`.
pub fn create_receiver(options: &StreamOptions) -> Result<StreamReceiver, Status> {
    create_receiver_with_factory(options, &ChannelFactory::default())
}

/// Open a receiver using an explicit channel factory.
#[instrument(name = "ipc_create_receiver", skip(options, factory), fields(stream = %options.stream_name))]
pub fn create_receiver_with_factory(
    options: &StreamOptions,
    factory: &ChannelFactory,
) -> Result<StreamReceiver, Status> {
    let inner = PacketReceiver::create_with_factory(options.receiver_options(), factory)?;
    debug!("Receiver handle created");
    Ok(StreamReceiver {
        inner,
        timeout: Duration::from_millis(options.receive_timeout_ms),
    })
}

/// Take the next packet, waiting up to the receiver's configured timeout.
///
/// `DEADLINE_EXCEEDED` means nothing arrived yet; `OUT_OF_RANGE` means the
/// stream ended normally. Any other code carries the failure that ended it.
pub fn receive(receiver: &StreamReceiver) -> Result<Packet, Status> {
    receiver
        .inner
        .receive(receiver.timeout)
        .map_err(Status::from)
}
