//! Flat records exchanged across the adapter boundary.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use streams_transport::{ConnectionOptions, ReceiverOptions, SenderOptions, SslOptions};

use crate::status::{Status, StatusCode};
use crate::{DEFAULT_RECEIVE_TIMEOUT_MS, DEFAULT_TARGET_ADDRESS};

/// Everything needed to open a sender or receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Server address (e.g., "localhost:50052").
    pub target_address: String,

    /// Use plain TCP instead of TLS.
    pub use_insecure_channel: bool,

    /// Expected server certificate name. Required unless insecure.
    pub ssl_domain_name: String,

    /// PEM file with trusted root certificates. Required unless insecure.
    pub ssl_root_cert_path: String,

    /// Stream to attach to.
    pub stream_name: String,

    /// How long a receive waits for a packet, in milliseconds.
    pub receive_timeout_ms: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            target_address: DEFAULT_TARGET_ADDRESS.to_string(),
            use_insecure_channel: false,
            ssl_domain_name: String::new(),
            ssl_root_cert_path: String::new(),
            stream_name: String::new(),
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }
}

impl StreamOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, Status> {
        serde_json::from_str(json)
            .map_err(|e| Status::new(StatusCode::InvalidArgument, format!("invalid stream options: {e}")))
    }

    /// Connection options for the transport.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            target_address: self.target_address.clone(),
            ssl_options: SslOptions {
                use_insecure_channel: self.use_insecure_channel,
                ssl_domain_name: self.ssl_domain_name.clone(),
                ssl_root_cert_path: self.ssl_root_cert_path.clone(),
            },
            ..Default::default()
        }
    }

    /// Receiver options with the default queue capacity.
    pub fn receiver_options(&self) -> ReceiverOptions {
        ReceiverOptions::new(self.connection_options(), self.stream_name.clone())
    }

    /// Sender options with the default send timeout.
    pub fn sender_options(&self) -> SenderOptions {
        SenderOptions::new(self.connection_options(), self.stream_name.clone())
    }
}

/// One buffer pulled by a [`PacketSource`](crate::PacketSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    /// Packet payload.
    pub payload: Bytes,

    /// New format descriptor, present only when it changed since the
    /// previous buffer.
    pub caps: Option<String>,

    /// Producer timestamp in microseconds.
    pub timestamp_micros: u64,
}
