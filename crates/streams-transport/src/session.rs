//! One framed session with the stream server.

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::channel::{BoxedStream, Channel};
use crate::codec::{self, ErrorStatus, Frame, FrameKind, OpenRequest};
use crate::error::{ConnectError, TransportError};
use crate::{TransportResult, MAX_FRAME_BYTES};

/// Build the runtime a receiver or sender drives its session on.
///
/// Setup blocks the caller, so it must not run on an async worker thread.
pub(crate) fn blocking_runtime() -> Result<Runtime, ConnectError> {
    if Handle::try_current().is_ok() {
        return Err(ConnectError::AsyncContext);
    }
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ConnectError::Runtime)
}

/// Direction of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Receive,
    Send,
}

impl SessionKind {
    fn open_frame(self) -> FrameKind {
        match self {
            Self::Receive => FrameKind::OpenReceive,
            Self::Send => FrameKind::OpenSend,
        }
    }
}

pub(crate) struct Session {
    stream: BoxedStream,
}

impl Session {
    /// Connect the channel and open a session on `stream_name`.
    ///
    /// The whole exchange is bounded by the channel's connect timeout.
    pub(crate) async fn open(
        channel: &Channel,
        kind: SessionKind,
        stream_name: &str,
    ) -> Result<Self, ConnectError> {
        let limit = channel.connect_timeout();
        match timeout(limit, Self::handshake(channel, kind, stream_name)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(addr = %channel.target(), "Session setup timed out");
                Err(ConnectError::Timeout(limit))
            }
        }
    }

    async fn handshake(
        channel: &Channel,
        kind: SessionKind,
        stream_name: &str,
    ) -> Result<Self, ConnectError> {
        let mut stream = channel.connect().await?;

        let request = OpenRequest {
            stream_name: stream_name.to_string(),
            authorization: channel.authorization().map(str::to_string),
        };
        let body = codec::encode_json(&request).map_err(ConnectError::Handshake)?;
        codec::write_frame(&mut stream, kind.open_frame(), &body)
            .await
            .map_err(ConnectError::Handshake)?;

        let reply = codec::read_frame(&mut stream, MAX_FRAME_BYTES)
            .await
            .map_err(ConnectError::Handshake)?;

        match reply {
            Some(Frame {
                kind: FrameKind::OpenOk,
                ..
            }) => {
                debug!(stream = stream_name, ?kind, "Session opened");
                Ok(Self { stream })
            }
            Some(Frame {
                kind: FrameKind::Error,
                body,
            }) => {
                let status: ErrorStatus = codec::decode_json(&body).map_err(ConnectError::Handshake)?;
                warn!(code = %status.code, message = %status.message, "Server rejected session");
                Err(ConnectError::Rejected {
                    code: status.code,
                    message: status.message,
                })
            }
            Some(frame) => Err(ConnectError::Handshake(TransportError::Protocol(format!(
                "expected open reply, got {:?} frame",
                frame.kind
            )))),
            None => Err(ConnectError::Handshake(TransportError::Protocol(
                "server closed the connection during session setup".to_string(),
            ))),
        }
    }

    /// Next frame, or `None` once the server has closed the session.
    pub(crate) async fn read_frame(&mut self) -> TransportResult<Option<Frame>> {
        codec::read_frame(&mut self.stream, MAX_FRAME_BYTES).await
    }

    pub(crate) async fn write_frame(&mut self, kind: FrameKind, body: &[u8]) -> TransportResult<()> {
        codec::write_frame(&mut self.stream, kind, body).await
    }
}

/// Turn an `Error` frame body into the terminal transport error.
pub(crate) fn remote_error(body: &[u8]) -> TransportError {
    match codec::decode_json::<ErrorStatus>(body) {
        Ok(status) => TransportError::Remote {
            code: status.code,
            message: status.message,
        },
        Err(err) => err,
    }
}
