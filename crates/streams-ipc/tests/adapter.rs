//! Adapter operations against a minimal blocking stream server.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use streams_ipc::{
    create_receiver, create_sender, receive, send, Packet, PacketSource, StatusCode, StreamOptions,
};
use streams_transport::codec::{self, ErrorStatus, FrameKind, OpenRequest};
use streams_transport::ErrorCode;

fn read_frame(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; codec::FRAME_HEADER_LEN];
    stream.read_exact(&mut header).ok()?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).ok()?;
    Some((header[0], body))
}

fn write_frame(stream: &mut TcpStream, kind: FrameKind, body: &[u8]) {
    stream.write_all(&codec::encode_frame(kind, body).unwrap()).unwrap();
}

/// Accept one connection, read the open request, then hand over to `script`.
fn serve_once<F>(script: F) -> (String, JoinHandle<OpenRequest>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let (_, body) = read_frame(&mut stream).unwrap();
        let request: OpenRequest = codec::decode_json(&body).unwrap();
        script(&mut stream);
        request
    });

    (addr, handle)
}

fn options(addr: &str, stream: &str) -> StreamOptions {
    StreamOptions {
        target_address: addr.to_string(),
        use_insecure_channel: true,
        stream_name: stream.to_string(),
        receive_timeout_ms: 2_000,
        ..Default::default()
    }
}

#[test]
fn test_source_renegotiates_only_on_descriptor_change() {
    let (addr, server) = serve_once(|stream| {
        write_frame(stream, FrameKind::OpenOk, &[]);
        for (payload, caps) in [(&b"1"[..], "video/x-h264"), (b"2", "video/x-h264"), (b"3", "image/jpeg")] {
            let packet = Packet::new(Bytes::from_static(payload)).with_type_descriptor(caps);
            write_frame(stream, FrameKind::Packet, &codec::encode_packet(&packet).unwrap());
        }
        stream.shutdown(Shutdown::Write).unwrap();
        while read_frame(stream).is_some() {}
    });

    let receiver = create_receiver(&options(&addr, "cam")).unwrap();
    let mut source = PacketSource::new(receiver);

    let first = source.next_buffer().unwrap();
    assert_eq!(first.payload.as_ref(), b"1");
    assert_eq!(first.caps.as_deref(), Some("video/x-h264"));

    let second = source.next_buffer().unwrap();
    assert_eq!(second.caps, None);

    let third = source.next_buffer().unwrap();
    assert_eq!(third.caps.as_deref(), Some("image/jpeg"));
    assert_eq!(source.current_caps(), Some("image/jpeg"));

    let end = source.next_buffer().unwrap_err();
    assert_eq!(end.code, StatusCode::OutOfRange);

    drop(source);
    assert_eq!(server.join().unwrap().stream_name, "cam");
}

#[test]
fn test_send_through_adapter() {
    let (addr, server) = serve_once(|stream| {
        write_frame(stream, FrameKind::OpenOk, &[]);
        while let Some((kind, body)) = read_frame(stream) {
            assert_eq!(kind, FrameKind::Packet as u8);
            let packet = codec::decode_packet(Bytes::from(body)).unwrap();
            write_frame(stream, FrameKind::Ack, &codec::encode_ack(packet.sequence()));
        }
    });

    let sender = create_sender(&options(&addr, "out")).unwrap();
    send(&sender, Packet::new(Bytes::from_static(b"hello"))).unwrap();
    send(&sender, Packet::new(Bytes::from_static(b"again"))).unwrap();
    assert_eq!(sender.stream_name(), "out");

    drop(sender);
    let request = server.join().unwrap();
    assert_eq!(request.stream_name, "out");
    assert!(request.authorization.is_none());
}

#[test]
fn test_rejection_maps_to_status() {
    let (addr, server) = serve_once(|stream| {
        let status = ErrorStatus {
            code: ErrorCode::NotFound,
            message: "no stream cam".to_string(),
        };
        write_frame(stream, FrameKind::Error, &codec::encode_json(&status).unwrap());
    });

    let status = create_receiver(&options(&addr, "cam")).err().unwrap();
    assert_eq!(status.code, StatusCode::NotFound);
    assert_eq!(status.message, "no stream cam");
    server.join().unwrap();
}

#[test]
fn test_receive_timeout_is_deadline_exceeded() {
    let (addr, server) = serve_once(|stream| {
        write_frame(stream, FrameKind::OpenOk, &[]);
        while read_frame(stream).is_some() {}
    });

    let mut opts = options(&addr, "cam");
    opts.receive_timeout_ms = 100;
    let receiver = create_receiver(&opts).unwrap();

    let status = receive(&receiver).unwrap_err();
    assert_eq!(status.code, StatusCode::DeadlineExceeded);
    assert!(status.code.is_retryable());

    drop(receiver);
    server.join().unwrap();
}

#[test]
fn test_secure_options_require_domain() {
    let opts = StreamOptions {
        target_address: "127.0.0.1:1".to_string(),
        ssl_root_cert_path: "/etc/roots.pem".to_string(),
        stream_name: "cam".to_string(),
        ..Default::default()
    };

    let status = create_sender(&opts).err().unwrap();
    assert_eq!(status.code, StatusCode::InvalidArgument);
    assert!(status.message.contains("ssl_domain_name"));
}
