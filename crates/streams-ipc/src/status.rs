//! Status codes returned across the adapter boundary.

use serde::{Deserialize, Serialize};
use streams_transport::{
    ChannelError, ConnectError, ErrorCode, ReceiveError, SendError, TransportError,
};
use thiserror::Error;

/// Coarse failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    DeadlineExceeded,
    /// The stream ended normally.
    OutOfRange,
    Internal,
}

impl StatusCode {
    /// Returns a simple string representation of the code.
    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unavailable => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Returns true if the caller may simply try again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

impl From<ErrorCode> for StatusCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NotFound => Self::NotFound,
            ErrorCode::Unauthenticated => Self::Unauthenticated,
            ErrorCode::PermissionDenied => Self::PermissionDenied,
            ErrorCode::InvalidArgument => Self::InvalidArgument,
            ErrorCode::Unavailable => Self::Unavailable,
            ErrorCode::Internal => Self::Internal,
        }
    }
}

/// A failure: code plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {message}", .code.name())]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    /// Create a status.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ChannelError> for Status {
    fn from(err: ChannelError) -> Self {
        let code = match err {
            ChannelError::InvalidArgument(_) | ChannelError::RootCert { .. } => {
                StatusCode::InvalidArgument
            }
            ChannelError::Connect { .. } | ChannelError::Tls(_) => StatusCode::Unavailable,
            ChannelError::Auth(_) => StatusCode::Unauthenticated,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ConnectError> for Status {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Channel(err) => err.into(),
            ConnectError::Rejected { code, message } => Self::new(code.into(), message),
            other => {
                let code = match other {
                    ConnectError::InvalidArgument(_) => StatusCode::InvalidArgument,
                    ConnectError::Timeout(_) => StatusCode::DeadlineExceeded,
                    ConnectError::Runtime(_) | ConnectError::AsyncContext => StatusCode::Internal,
                    _ => StatusCode::Unavailable,
                };
                Self::new(code, other.to_string())
            }
        }
    }
}

impl From<&TransportError> for Status {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Remote { code, message } => Self::new((*code).into(), message.clone()),
            other => Self::new(StatusCode::Unavailable, other.to_string()),
        }
    }
}

impl From<ReceiveError> for Status {
    fn from(err: ReceiveError) -> Self {
        match err {
            ReceiveError::Timeout => Self::new(StatusCode::DeadlineExceeded, err.to_string()),
            ReceiveError::Closed { cause: Some(ref cause) } => Status::from(&**cause),
            ReceiveError::Closed { cause: None } => Self::new(StatusCode::OutOfRange, err.to_string()),
        }
    }
}

impl From<SendError> for Status {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Rejected { code, message } => Self::new(code.into(), message),
            other => {
                let code = match other {
                    SendError::Unauthenticated(_) => StatusCode::Unauthenticated,
                    SendError::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
                    SendError::InvalidArgument(_) => StatusCode::InvalidArgument,
                    _ => StatusCode::Unavailable,
                };
                Self::new(code, other.to_string())
            }
        }
    }
}
