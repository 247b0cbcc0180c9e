//! The unit of data exchanged with the stream server.

use bytes::Bytes;

/// Metadata carried alongside every packet payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// Stream the packet belongs to.
    pub stream_name: String,

    /// Position in the stream. Zero until the packet is sent or received.
    pub sequence: u64,

    /// Format descriptor of the payload (e.g. a caps string). Empty if unknown.
    pub type_descriptor: String,

    /// Producer timestamp in microseconds.
    pub timestamp_micros: u64,
}

/// An immutable packet: header plus opaque payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Bytes,
}

impl Packet {
    /// Create a packet around a payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            header: PacketHeader::default(),
            payload: payload.into(),
        }
    }

    /// Create a packet from a complete header.
    pub fn from_parts(header: PacketHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Set the payload format descriptor.
    pub fn with_type_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.header.type_descriptor = descriptor.into();
        self
    }

    /// Set the producer timestamp.
    pub fn with_timestamp_micros(mut self, timestamp_micros: u64) -> Self {
        self.header.timestamp_micros = timestamp_micros;
        self
    }

    /// Packet header.
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// Stream the packet belongs to.
    pub fn stream_name(&self) -> &str {
        &self.header.stream_name
    }

    /// Sequence number, 0 if unset.
    pub fn sequence(&self) -> u64 {
        self.header.sequence
    }

    /// Format descriptor, empty if unknown.
    pub fn type_descriptor(&self) -> &str {
        &self.header.type_descriptor
    }

    /// Timestamp in microseconds.
    pub fn timestamp_micros(&self) -> u64 {
        self.header.timestamp_micros
    }

    /// Opaque payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Split into header and payload.
    pub fn into_parts(self) -> (PacketHeader, Bytes) {
        (self.header, self.payload)
    }

    /// Fill in stream name and sequence where the producer left them unset.
    pub(crate) fn stamped(mut self, stream_name: &str, sequence: u64) -> Self {
        if self.header.stream_name.is_empty() {
            self.header.stream_name = stream_name.to_string();
        }
        if self.header.sequence == 0 {
            self.header.sequence = sequence;
        }
        self
    }
}
