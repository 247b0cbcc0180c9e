//! Fake stream server for integration tests.
//!
//! Runs on its own tokio runtime so tests can drive the blocking client API
//! from the test thread.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use streams_transport::codec::{self, ErrorStatus, FrameKind, OpenRequest};
use streams_transport::{ErrorCode, Packet, PacketHeader, TransportResult, MAX_FRAME_BYTES};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_rustls::TlsAcceptor;

/// How a receive session ends after the scripted packets.
#[derive(Debug, Clone)]
pub enum StreamEnd {
    /// Close the connection at a frame boundary.
    Close,
    /// Keep the connection open until the client leaves.
    Hold,
    /// Send an error frame.
    Error(ErrorCode, &'static str),
    /// Close in the middle of a frame.
    Truncate,
}

/// Scripted server behavior, applied to every accepted connection.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Accept, send `packets`, then end as `end` says.
    Stream { packets: Vec<Packet>, end: StreamEnd },
    /// Refuse the session.
    Reject(ErrorCode, &'static str),
    /// Accept and acknowledge every packet.
    Ack,
    /// Accept, read packets, never acknowledge.
    Silent,
    /// Accept, then answer the first packet with an error.
    FailSend(ErrorCode, &'static str),
}

pub struct FakeServer {
    pub addr: String,
    pub requests: Receiver<OpenRequest>,
    pub packets: Receiver<Packet>,
    runtime: Option<Runtime>,
}

impl FakeServer {
    /// Plain TCP server on a loopback port.
    pub fn start(behavior: Behavior) -> Self {
        Self::spawn(behavior, None)
    }

    /// TLS server presenting `identity`.
    pub fn start_tls(behavior: Behavior, identity: &TestIdentity) -> Self {
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![identity.cert_der.clone()],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_der.clone())),
        )
        .unwrap();

        Self::spawn(behavior, Some(TlsAcceptor::from(Arc::new(config))))
    }

    fn spawn(behavior: Behavior, tls: Option<TlsAcceptor>) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (request_tx, requests) = unbounded();
        let (packet_tx, packets) = unbounded();

        runtime.spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                let behavior = behavior.clone();
                let request_tx = request_tx.clone();
                let packet_tx = packet_tx.clone();
                let tls = tls.clone();

                tokio::spawn(async move {
                    let _ = match tls {
                        Some(acceptor) => match acceptor.accept(tcp).await {
                            Ok(stream) => serve(stream, behavior, request_tx, packet_tx).await,
                            Err(_) => return,
                        },
                        None => serve(tcp, behavior, request_tx, packet_tx).await,
                    };
                });
            }
        });

        Self {
            addr,
            requests,
            packets,
            runtime: Some(runtime),
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn serve<S>(
    mut stream: S,
    behavior: Behavior,
    requests: Sender<OpenRequest>,
    packets: Sender<Packet>,
) -> TransportResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(open) = codec::read_frame(&mut stream, MAX_FRAME_BYTES).await? else {
        return Ok(());
    };
    let request: OpenRequest = codec::decode_json(&open.body)?;
    let _ = requests.send(request);

    if let Behavior::Reject(code, message) = behavior {
        return write_error(&mut stream, code, message).await;
    }
    codec::write_frame(&mut stream, FrameKind::OpenOk, &[]).await?;

    match behavior {
        Behavior::Stream { packets: out, end } => {
            for packet in &out {
                let body = codec::encode_packet(packet)?;
                codec::write_frame(&mut stream, FrameKind::Packet, &body).await?;
            }
            match end {
                StreamEnd::Close => stream.shutdown().await?,
                StreamEnd::Hold => drain(&mut stream).await,
                StreamEnd::Error(code, message) => write_error(&mut stream, code, message).await?,
                StreamEnd::Truncate => {
                    // Header promises 100 bytes, three follow.
                    stream.write_all(&[0x05, 0x00, 0x00, 0x00, 0x64, 1, 2, 3]).await?;
                    stream.shutdown().await?;
                }
            }
        }
        Behavior::Ack => {
            while let Some(frame) = codec::read_frame(&mut stream, MAX_FRAME_BYTES).await? {
                if frame.kind != FrameKind::Packet {
                    continue;
                }
                let packet = codec::decode_packet(frame.body)?;
                let ack = codec::encode_ack(packet.sequence());
                let _ = packets.send(packet);
                codec::write_frame(&mut stream, FrameKind::Ack, &ack).await?;
            }
        }
        Behavior::Silent => drain(&mut stream).await,
        Behavior::FailSend(code, message) => {
            if codec::read_frame(&mut stream, MAX_FRAME_BYTES).await?.is_some() {
                write_error(&mut stream, code, message).await?;
            }
        }
        Behavior::Reject(..) => unreachable!(),
    }

    Ok(())
}

async fn drain<S: AsyncRead + Unpin>(stream: &mut S) {
    while let Ok(Some(_)) = codec::read_frame(stream, MAX_FRAME_BYTES).await {}
}

async fn write_error<S: AsyncWrite + Unpin>(
    stream: &mut S,
    code: ErrorCode,
    message: &str,
) -> TransportResult<()> {
    let status = ErrorStatus {
        code,
        message: message.to_string(),
    };
    let body = codec::encode_json(&status)?;
    codec::write_frame(stream, FrameKind::Error, &body).await?;
    stream.shutdown().await?;
    Ok(())
}

/// A packet as a server would send it.
pub fn packet(stream: &str, sequence: u64, descriptor: &str, payload: &'static [u8]) -> Packet {
    let header = PacketHeader {
        stream_name: stream.to_string(),
        sequence,
        type_descriptor: descriptor.to_string(),
        timestamp_micros: sequence * 1_000,
    };
    Packet::from_parts(header, Bytes::from_static(payload))
}

/// Self-signed certificate for `localhost`, with its PEM written to disk.
pub struct TestIdentity {
    pub cert_der: CertificateDer<'static>,
    pub key_der: Vec<u8>,
    pub pem_path: PathBuf,
}

impl TestIdentity {
    pub fn localhost(tag: &str) -> Self {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let pem_path =
            std::env::temp_dir().join(format!("streams-transport-{}-{tag}.pem", std::process::id()));
        std::fs::write(&pem_path, cert.serialize_pem().unwrap()).unwrap();

        Self {
            cert_der: CertificateDer::from(cert.serialize_der().unwrap()),
            key_der: cert.serialize_private_key_der(),
            pem_path,
        }
    }
}

impl Drop for TestIdentity {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.pem_path);
    }
}

/// Address nothing is listening on.
pub fn unused_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
