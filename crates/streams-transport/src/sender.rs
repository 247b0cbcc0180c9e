//! Synchronous packet sender.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, trace, warn};

use crate::channel::ChannelFactory;
use crate::codec::{self, FrameKind};
use crate::connection::{SenderCounters, SenderStatistics};
use crate::error::{ConnectError, SendError, TransportError};
use crate::options::SenderOptions;
use crate::packet::Packet;
use crate::session::{self, Session, SessionKind};
use crate::TransportResult;

/// Sends packets to one stream, one acknowledged packet at a time.
///
/// There is no retry or buffering. After a failure the session is dropped
/// and every later send returns [`SendError::Unavailable`].
pub struct PacketSender {
    stream_name: String,
    runtime: Runtime,
    session: Mutex<Option<Session>>,
    sequence: AtomicU64,
    send_timeout: Duration,
    counters: SenderCounters,
}

impl PacketSender {
    /// Connect with the default channel factory.
    pub fn create(options: SenderOptions) -> Result<Self, ConnectError> {
        Self::create_with_factory(options, &ChannelFactory::default())
    }

    /// Connect through `factory` and open a send session.
    #[instrument(name = "sender_create", skip(options, factory), fields(stream = %options.stream_name))]
    pub fn create_with_factory(
        options: SenderOptions,
        factory: &ChannelFactory,
    ) -> Result<Self, ConnectError> {
        if options.stream_name.is_empty() {
            return Err(ConnectError::InvalidArgument(
                "stream_name must not be empty".to_string(),
            ));
        }

        let runtime = session::blocking_runtime()?;
        let channel = factory.build_channel(&options.connection)?;

        let session = runtime.block_on(Session::open(&channel, SessionKind::Send, &options.stream_name))?;
        info!("Sender ready");

        Ok(Self {
            send_timeout: options.send_timeout(),
            stream_name: options.stream_name,
            runtime,
            session: Mutex::new(Some(session)),
            sequence: AtomicU64::new(0),
            counters: SenderCounters::default(),
        })
    }

    /// Send one packet and wait for the server to acknowledge it.
    ///
    /// Missing stream name and sequence are filled in from the sender.
    #[instrument(name = "send", skip(self, packet), fields(stream = %self.stream_name))]
    pub fn send(&self, packet: Packet) -> Result<(), SendError> {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return Err(SendError::Unavailable(
                "session closed after an earlier failure".to_string(),
            ));
        };

        // Sends are serialized by the session lock.
        let next = self.sequence.load(Ordering::SeqCst) + 1;
        let packet = packet.stamped(&self.stream_name, next);
        let sequence = packet.sequence();
        let body = codec::encode_packet(&packet).map_err(|e| SendError::InvalidArgument(e.to_string()))?;
        self.sequence.store(next, Ordering::SeqCst);

        let limit = self.send_timeout;
        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(limit, exchange(session, &body, sequence)).await });
        match outcome {
            Ok(Ok(())) => {
                self.counters.record_sent(packet.payload().len());
                trace!(sequence, len = packet.payload().len(), "Packet acknowledged");
                Ok(())
            }
            Ok(Err(err)) => {
                warn!("Send failed: {}", err);
                *guard = None;
                Err(err.into())
            }
            Err(_) => {
                warn!(sequence, "No acknowledgement within {:?}", self.send_timeout);
                *guard = None;
                Err(SendError::DeadlineExceeded(self.send_timeout))
            }
        }
    }

    /// Drop the session. Later sends return [`SendError::Unavailable`].
    pub fn close(&self) {
        if self.session.lock().take().is_some() {
            debug!(stream = %self.stream_name, "Sender closed");
        }
    }

    /// Check if the session is still usable.
    pub fn is_available(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Stream being sent to.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Counters so far.
    pub fn statistics(&self) -> SenderStatistics {
        self.counters.snapshot()
    }
}

async fn exchange(session: &mut Session, body: &[u8], sequence: u64) -> TransportResult<()> {
    session.write_frame(FrameKind::Packet, body).await?;

    loop {
        let frame = session.read_frame().await?.ok_or_else(|| {
            TransportError::Protocol("server closed the session before acknowledging".to_string())
        })?;

        match frame.kind {
            FrameKind::Ack => {
                let acked = codec::decode_ack(frame.body)?;
                if acked == sequence {
                    return Ok(());
                }
                if acked > sequence {
                    return Err(TransportError::Protocol(format!(
                        "ack for {acked} while waiting for {sequence}"
                    )));
                }
                // Late ack for an earlier packet.
                debug!(acked, sequence, "Ignoring stale ack");
            }
            FrameKind::Error => return Err(session::remote_error(&frame.body)),
            other => {
                return Err(TransportError::Protocol(format!(
                    "unexpected {other:?} frame on a send session"
                )))
            }
        }
    }
}
