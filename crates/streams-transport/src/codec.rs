//! Session framing on the wire.
//!
//! Every message is a frame:
//! - kind: 1 byte
//! - body length: 4 bytes (big-endian)
//! - body: variable
//!
//! Session setup bodies (`OpenReceive`, `OpenSend`, `Error`) are JSON.
//! A `Packet` body is binary:
//! - sequence: 8 bytes
//! - timestamp (µs): 8 bytes
//! - stream name length: 2 bytes, then the name
//! - type descriptor length: 2 bytes, then the descriptor
//! - payload: the rest of the body
//!
//! An `Ack` body is the acknowledged sequence (8 bytes).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::TransportError;
use crate::packet::{Packet, PacketHeader};
use crate::{TransportResult, MAX_FRAME_BYTES};

/// Size of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 5;

const PACKET_FIXED_LEN: usize = 8 + 8 + 2 + 2;

/// Frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Client asks to receive from a stream.
    OpenReceive = 1,
    /// Client asks to send to a stream.
    OpenSend = 2,
    /// Server accepted the session.
    OpenOk = 3,
    /// Server reports a failure.
    Error = 4,
    /// A packet.
    Packet = 5,
    /// Server acknowledges a sent packet.
    Ack = 6,
}

impl FrameKind {
    /// Parse a frame kind byte.
    pub fn from_byte(byte: u8) -> TransportResult<Self> {
        match byte {
            1 => Ok(Self::OpenReceive),
            2 => Ok(Self::OpenSend),
            3 => Ok(Self::OpenOk),
            4 => Ok(Self::Error),
            5 => Ok(Self::Packet),
            6 => Ok(Self::Ack),
            other => Err(TransportError::UnknownFrame(other)),
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: Bytes,
}

/// Status codes the server reports in `Error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    Unavailable,
    Internal,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidArgument => "invalid_argument",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `OpenReceive` / `OpenSend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub stream_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

/// Body of `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatus {
    pub code: ErrorCode,
    pub message: String,
}

/// Build a complete frame.
pub fn encode_frame(kind: FrameKind, body: &[u8]) -> TransportResult<Bytes> {
    let len = u32::try_from(body.len()).map_err(|_| TransportError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
    buf.put_u8(kind as u8);
    buf.put_u32(len);
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Serialize a JSON frame body.
pub fn encode_json<T: Serialize>(value: &T) -> TransportResult<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| TransportError::Protocol(format!("failed to encode frame body: {e}")))
}

/// Deserialize a JSON frame body.
pub fn decode_json<'a, T: Deserialize<'a>>(body: &'a [u8]) -> TransportResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| TransportError::Protocol(format!("malformed frame body: {e}")))
}

/// Encode a packet frame body.
pub fn encode_packet(packet: &Packet) -> TransportResult<Bytes> {
    let header = packet.header();
    let name = header.stream_name.as_bytes();
    let descriptor = header.type_descriptor.as_bytes();

    if name.len() > u16::MAX as usize {
        return Err(TransportError::Protocol(format!(
            "stream name is {} bytes, limit is {}",
            name.len(),
            u16::MAX
        )));
    }
    if descriptor.len() > u16::MAX as usize {
        return Err(TransportError::Protocol(format!(
            "type descriptor is {} bytes, limit is {}",
            descriptor.len(),
            u16::MAX
        )));
    }

    let len = PACKET_FIXED_LEN + name.len() + descriptor.len() + packet.payload().len();
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_BYTES,
        });
    }

    let mut buf = BytesMut::with_capacity(len);
    buf.put_u64(header.sequence);
    buf.put_u64(header.timestamp_micros);
    buf.put_u16(name.len() as u16);
    buf.put_slice(name);
    buf.put_u16(descriptor.len() as u16);
    buf.put_slice(descriptor);
    buf.put_slice(packet.payload());

    Ok(buf.freeze())
}

/// Decode a packet frame body. The payload shares the body's buffer.
pub fn decode_packet(mut body: Bytes) -> TransportResult<Packet> {
    if body.len() < PACKET_FIXED_LEN {
        return Err(TransportError::Protocol(format!(
            "packet body is {} bytes, shorter than the {PACKET_FIXED_LEN} byte header",
            body.len()
        )));
    }

    let sequence = body.get_u64();
    let timestamp_micros = body.get_u64();
    let stream_name = take_string(&mut body, "stream name")?;
    let type_descriptor = take_string(&mut body, "type descriptor")?;

    let header = PacketHeader {
        stream_name,
        sequence,
        type_descriptor,
        timestamp_micros,
    };
    Ok(Packet::from_parts(header, body))
}

fn take_string(body: &mut Bytes, what: &str) -> TransportResult<String> {
    if body.remaining() < 2 {
        return Err(TransportError::Protocol(format!("packet truncated before {what} length")));
    }
    let len = body.get_u16() as usize;
    if body.remaining() < len {
        return Err(TransportError::Protocol(format!(
            "{what} claims {len} bytes but only {} remain",
            body.remaining()
        )));
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| TransportError::Protocol(format!("{what} is not valid UTF-8")))
}

/// Encode an `Ack` body.
pub fn encode_ack(sequence: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64(sequence);
    buf.freeze()
}

/// Decode an `Ack` body.
pub fn decode_ack(mut body: Bytes) -> TransportResult<u64> {
    if body.len() != 8 {
        return Err(TransportError::Protocol(format!(
            "ack body is {} bytes, expected 8",
            body.len()
        )));
    }
    Ok(body.get_u64())
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, kind: FrameKind, body: &[u8]) -> TransportResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(kind, body)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(?kind, len = body.len(), "Wrote frame");
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` if the peer closed the connection cleanly between
/// frames. A connection that ends inside a frame is an error.
pub async fn read_frame<R>(reader: &mut R, max_body_len: usize) -> TransportResult<Option<Frame>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_LEN];

    let n = reader.read(&mut header[..1]).await?;
    if n == 0 {
        return Ok(None);
    }

    reader
        .read_exact(&mut header[1..])
        .await
        .map_err(|e| truncated(e, "frame header"))?;

    let kind = FrameKind::from_byte(header[0])?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > max_body_len {
        return Err(TransportError::FrameTooLarge {
            len,
            max: max_body_len,
        });
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| truncated(e, "frame body"))?;

    trace!(?kind, len, "Read frame");
    Ok(Some(Frame {
        kind,
        body: Bytes::from(body),
    }))
}

fn truncated(err: std::io::Error, what: &'static str) -> TransportError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::Truncated(what)
    } else {
        TransportError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        let header = PacketHeader {
            stream_name: "cam".to_string(),
            sequence: 0x0102,
            type_descriptor: "jpg".to_string(),
            timestamp_micros: 9,
        };
        Packet::from_parts(header, Bytes::from_static(&[0xAA, 0xBB]))
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(FrameKind::Ack, &[1, 2, 3]).unwrap();
        assert_eq!(frame.as_ref(), &[0x06, 0x00, 0x00, 0x00, 0x03, 1, 2, 3]);
    }

    #[test]
    fn test_encode_packet_layout() {
        let body = encode_packet(&sample_packet()).unwrap();

        assert_eq!(&body[0..8], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]); // sequence
        assert_eq!(&body[8..16], &[0, 0, 0, 0, 0, 0, 0, 9]); // timestamp
        assert_eq!(&body[16..18], &[0, 3]); // name length
        assert_eq!(&body[18..21], b"cam");
        assert_eq!(&body[21..23], &[0, 3]); // descriptor length
        assert_eq!(&body[23..26], b"jpg");
        assert_eq!(&body[26..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_encode_packet_rejects_oversized_body() {
        let payload = vec![0u8; MAX_FRAME_BYTES - PACKET_FIXED_LEN - 3 - 3 + 1];
        let packet = Packet::from_parts(sample_packet().header().clone(), Bytes::from(payload));
        assert!(matches!(
            encode_packet(&packet),
            Err(TransportError::FrameTooLarge { max: MAX_FRAME_BYTES, .. })
        ));
    }

    #[test]
    fn test_decode_packet_restores_header_and_payload() {
        let body = encode_packet(&sample_packet()).unwrap();
        let packet = decode_packet(body).unwrap();
        assert_eq!(packet, sample_packet());
    }

    #[test]
    fn test_decode_packet_rejects_short_body() {
        assert!(matches!(
            decode_packet(Bytes::from_static(&[0u8; 10])),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_packet_rejects_overlong_name() {
        let mut body = BytesMut::new();
        body.put_u64(1);
        body.put_u64(0);
        body.put_u16(50); // name claims 50 bytes
        body.put_slice(b"abc");
        assert!(matches!(
            decode_packet(body.freeze()),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn test_ack_body() {
        assert_eq!(decode_ack(encode_ack(77)).unwrap(), 77);
        assert!(decode_ack(Bytes::from_static(&[1, 2])).is_err());
    }

    #[test]
    fn test_error_status_json() {
        let status = ErrorStatus {
            code: ErrorCode::NotFound,
            message: "no such stream".to_string(),
        };
        let body = encode_json(&status).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"code":"not_found","message":"no such stream"}"#
        );
        let decoded: ErrorStatus = decode_json(&body).unwrap();
        assert_eq!(decoded, status);
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof() {
        let mut input: &[u8] = &[];
        assert!(read_frame(&mut input, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_truncated_body() {
        let mut input: &[u8] = &[0x05, 0x00, 0x00, 0x00, 0x10, 0x01];
        assert!(matches!(
            read_frame(&mut input, 1024).await,
            Err(TransportError::Truncated("frame body"))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_large_body() {
        let mut input: &[u8] = &[0x05, 0x00, 0x01, 0x00, 0x00];
        assert!(matches!(
            read_frame(&mut input, 1024).await,
            Err(TransportError::FrameTooLarge { len: 65536, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_unknown_kind() {
        let mut input: &[u8] = &[0x7F, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            read_frame(&mut input, 1024).await,
            Err(TransportError::UnknownFrame(0x7F))
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_frame() {
        let mut wire = Vec::new();
        write_frame(&mut wire, FrameKind::OpenOk, b"").await.unwrap();
        write_frame(&mut wire, FrameKind::Ack, &encode_ack(5)).await.unwrap();

        let mut input: &[u8] = &wire;
        let first = read_frame(&mut input, 1024).await.unwrap().unwrap();
        assert_eq!(first.kind, FrameKind::OpenOk);
        assert!(first.body.is_empty());

        let second = read_frame(&mut input, 1024).await.unwrap().unwrap();
        assert_eq!(second.kind, FrameKind::Ack);
        assert_eq!(decode_ack(second.body).unwrap(), 5);

        assert!(read_frame(&mut input, 1024).await.unwrap().is_none());
    }
}
