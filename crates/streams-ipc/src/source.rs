//! Pull-style source for media pipelines.

use tracing::info;

use crate::handles::{receive, StreamReceiver};
use crate::status::Status;
use crate::types::SourceBuffer;

/// Tracks the negotiated format descriptor.
#[derive(Debug, Clone, Default)]
pub struct CapsTracker {
    current: Option<String>,
}

impl CapsTracker {
    /// Feed the descriptor of the next packet.
    ///
    /// Returns the descriptor when downstream must renegotiate: on the first
    /// non-empty descriptor, and whenever it differs from the last one. An
    /// empty descriptor keeps the current format.
    pub fn observe(&mut self, descriptor: &str) -> Option<String> {
        if descriptor.is_empty() || self.current.as_deref() == Some(descriptor) {
            return None;
        }
        self.current = Some(descriptor.to_string());
        self.current.clone()
    }

    /// Caps last reported, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

/// Pulls packets from a receiver and turns them into pipeline buffers.
pub struct PacketSource {
    receiver: StreamReceiver,
    caps: CapsTracker,
}

impl PacketSource {
    /// Wrap a receiver handle.
    pub fn new(receiver: StreamReceiver) -> Self {
        Self {
            receiver,
            caps: CapsTracker::default(),
        }
    }

    /// Pull the next buffer.
    pub fn next_buffer(&mut self) -> Result<SourceBuffer, Status> {
        let packet = receive(&self.receiver)?;

        let caps = self.caps.observe(packet.type_descriptor());
        if let Some(ref caps) = caps {
            info!(stream = %self.receiver.stream_name(), caps = %caps, "Setting caps");
        }

        let timestamp_micros = packet.timestamp_micros();
        let (_, payload) = packet.into_parts();
        Ok(SourceBuffer {
            payload,
            caps,
            timestamp_micros,
        })
    }

    /// Format currently negotiated downstream.
    pub fn current_caps(&self) -> Option<&str> {
        self.caps.current()
    }

    /// Give back the underlying receiver.
    pub fn into_receiver(self) -> StreamReceiver {
        self.receiver
    }
}
