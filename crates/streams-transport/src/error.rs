//! Error types for the transport module.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use streams_auth::AuthError;
use thiserror::Error;

use crate::codec::ErrorCode;

/// Errors building or connecting a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Options are incomplete or inconsistent.
    #[error("Invalid channel options: {0}")]
    InvalidArgument(String),

    /// TCP connection to the target failed.
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Root certificate file could not be read.
    #[error("Failed to read root certificates from {}: {source}", .path.display())]
    RootCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TLS configuration or handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// No identity token could be obtained.
    #[error("Failed to obtain identity token: {0}")]
    Auth(#[from] AuthError),
}

/// Errors creating a receiver or sender.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Options are incomplete or inconsistent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Channel could not be established.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Session setup did not finish in time.
    #[error("Session setup timed out after {0:?}")]
    Timeout(Duration),

    /// Server refused the session.
    #[error("Server rejected session ({code}): {message}")]
    Rejected { code: ErrorCode, message: String },

    /// Session setup failed on the wire.
    #[error("Session handshake failed: {0}")]
    Handshake(#[source] TransportError),

    /// Called from inside an async runtime, where setup cannot block.
    #[error("Cannot create a blocking stream client from within an async runtime")]
    AsyncContext,

    /// Background runtime or worker thread could not be started.
    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Failures of an established session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the connection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection ended inside a frame.
    #[error("Connection closed mid-frame while reading {0}")]
    Truncated(&'static str),

    /// Frame body exceeds the limit.
    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Unknown frame kind byte.
    #[error("Unknown frame kind {0:#04x}")]
    UnknownFrame(u8),

    /// Peer violated the session protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server terminated the session with an error.
    #[error("Server error ({code}): {message}")]
    Remote { code: ErrorCode, message: String },
}

/// Errors from [`PacketReceiver::receive`](crate::PacketReceiver::receive).
#[derive(Debug, Clone, Error)]
pub enum ReceiveError {
    /// Nothing arrived within the timeout. The stream is still live.
    #[error("No packet arrived within the timeout")]
    Timeout,

    /// The stream has ended and every buffered packet has been consumed.
    ///
    /// `cause` holds the transport failure that ended the stream, or `None`
    /// when it ended normally.
    #[error("Stream closed{}", closed_suffix(.cause))]
    Closed { cause: Option<Arc<TransportError>> },
}

fn closed_suffix(cause: &Option<Arc<TransportError>>) -> String {
    match cause {
        Some(err) => format!(": {err}"),
        None => String::new(),
    }
}

impl ReceiveError {
    /// Check if no packet arrived in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Check if the stream has ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// Errors from [`PacketSender::send`](crate::PacketSender::send).
#[derive(Debug, Error)]
pub enum SendError {
    /// Session is not usable.
    #[error("Stream unavailable: {0}")]
    Unavailable(String),

    /// Server refused the credentials.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// No acknowledgement within the send timeout.
    #[error("No acknowledgement within {0:?}")]
    DeadlineExceeded(Duration),

    /// Server refused the packet.
    #[error("Server rejected packet ({code}): {message}")]
    Rejected { code: ErrorCode, message: String },

    /// Packet cannot be encoded.
    #[error("Invalid packet: {0}")]
    InvalidArgument(String),
}

impl From<TransportError> for SendError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Remote {
                code: ErrorCode::Unauthenticated | ErrorCode::PermissionDenied,
                message,
            } => Self::Unauthenticated(message),
            TransportError::Remote {
                code: ErrorCode::Unavailable,
                message,
            } => Self::Unavailable(message),
            TransportError::Remote { code, message } => Self::Rejected { code, message },
            other => Self::Unavailable(other.to_string()),
        }
    }
}
