//! Connection, receiver and sender configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_SEND_TIMEOUT_MS, DEFAULT_TARGET_ADDRESS, PACKET_QUEUE_CAPACITY};

/// TLS settings for a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SslOptions {
    /// Use plain TCP. No token is attached.
    pub use_insecure_channel: bool,

    /// Name the server certificate must be valid for.
    pub ssl_domain_name: String,

    /// PEM file with the trusted root certificates.
    pub ssl_root_cert_path: String,
}

/// Where and how to reach the stream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Server address as `host:port`.
    pub target_address: String,

    /// TLS settings.
    pub ssl_options: SslOptions,

    /// Bound on connecting plus session setup, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            target_address: DEFAULT_TARGET_ADDRESS.to_string(),
            ssl_options: SslOptions::default(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// Validated channel security mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSecurity {
    /// Plain TCP, no credentials.
    Insecure,

    /// TLS against `root_cert_path`, verified for `domain`, with a token.
    Secure {
        domain: String,
        root_cert_path: PathBuf,
    },
}

impl ConnectionOptions {
    /// Plain TCP options for `target_address`.
    pub fn insecure(target_address: impl Into<String>) -> Self {
        Self {
            target_address: target_address.into(),
            ssl_options: SslOptions {
                use_insecure_channel: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// TLS options for `target_address`.
    pub fn secure(
        target_address: impl Into<String>,
        domain: impl Into<String>,
        root_cert_path: impl Into<String>,
    ) -> Self {
        Self {
            target_address: target_address.into(),
            ssl_options: SslOptions {
                use_insecure_channel: false,
                ssl_domain_name: domain.into(),
                ssl_root_cert_path: root_cert_path.into(),
            },
            ..Default::default()
        }
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the options and resolve the security mode.
    pub fn security(&self) -> Result<ChannelSecurity, ChannelError> {
        if self.target_address.trim().is_empty() {
            return Err(ChannelError::InvalidArgument(
                "target_address must not be empty".to_string(),
            ));
        }

        let ssl = &self.ssl_options;
        if ssl.use_insecure_channel {
            return Ok(ChannelSecurity::Insecure);
        }

        if ssl.ssl_domain_name.is_empty() {
            return Err(ChannelError::InvalidArgument(
                "ssl_domain_name is required for a secure channel".to_string(),
            ));
        }
        if ssl.ssl_root_cert_path.is_empty() {
            return Err(ChannelError::InvalidArgument(
                "ssl_root_cert_path is required for a secure channel".to_string(),
            ));
        }

        Ok(ChannelSecurity::Secure {
            domain: ssl.ssl_domain_name.clone(),
            root_cert_path: PathBuf::from(&ssl.ssl_root_cert_path),
        })
    }
}

/// Configuration for a [`PacketReceiver`](crate::PacketReceiver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverOptions {
    pub connection: ConnectionOptions,

    /// Stream to receive from.
    pub stream_name: String,

    /// Packets buffered between the network thread and consumers.
    pub queue_capacity: usize,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            stream_name: String::new(),
            queue_capacity: PACKET_QUEUE_CAPACITY,
        }
    }
}

impl ReceiverOptions {
    /// Receiver options for `stream_name`.
    pub fn new(connection: ConnectionOptions, stream_name: impl Into<String>) -> Self {
        Self {
            connection,
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Configuration for a [`PacketSender`](crate::PacketSender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderOptions {
    pub connection: ConnectionOptions,

    /// Stream to send to.
    pub stream_name: String,

    /// How long one send waits for the server acknowledgement, in milliseconds.
    pub send_timeout_ms: u64,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            stream_name: String::new(),
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}

impl SenderOptions {
    /// Sender options for `stream_name`.
    pub fn new(connection: ConnectionOptions, stream_name: impl Into<String>) -> Self {
        Self {
            connection,
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    /// Set the acknowledgement timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Acknowledgement timeout as a duration.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
