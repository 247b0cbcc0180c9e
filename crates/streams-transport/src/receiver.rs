//! Background packet receiver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use streams_queue::{BoundedHandoffQueue, PopError, PushError, ReceiverQueue};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::channel::ChannelFactory;
use crate::codec::{self, FrameKind};
use crate::connection::{ReceiverCounters, ReceiverState, ReceiverStatistics};
use crate::error::{ConnectError, ReceiveError, TransportError};
use crate::options::ReceiverOptions;
use crate::packet::Packet;
use crate::session::{self, Session, SessionKind};
use crate::PUSH_RETRY_INTERVAL_MS;

/// Receives packets from one stream on a background thread.
///
/// Packets are buffered in a bounded queue. Consumers call
/// [`receive`](Self::receive) or pull from extra handles obtained with
/// [`receiver_queue`](Self::receiver_queue). When the stream ends the queue
/// is closed: buffered packets remain available, then every consumer sees
/// [`ReceiveError::Closed`].
pub struct PacketReceiver {
    stream_name: String,
    queue: Arc<BoundedHandoffQueue<Packet>>,
    state: Arc<RwLock<ReceiverState>>,
    failure: Arc<Mutex<Option<Arc<TransportError>>>>,
    should_stop: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<ReceiverCounters>,
}

impl PacketReceiver {
    /// Connect with the default channel factory and start receiving.
    pub fn create(options: ReceiverOptions) -> Result<Self, ConnectError> {
        Self::create_with_factory(options, &ChannelFactory::default())
    }

    /// Connect through `factory` and start receiving.
    ///
    /// Returns once the server has accepted the session.
    #[instrument(name = "receiver_create", skip(options, factory), fields(stream = %options.stream_name))]
    pub fn create_with_factory(
        options: ReceiverOptions,
        factory: &ChannelFactory,
    ) -> Result<Self, ConnectError> {
        if options.stream_name.is_empty() {
            return Err(ConnectError::InvalidArgument(
                "stream_name must not be empty".to_string(),
            ));
        }

        let runtime = session::blocking_runtime()?;
        let channel = factory.build_channel(&options.connection)?;

        let session = runtime.block_on(Session::open(
            &channel,
            SessionKind::Receive,
            &options.stream_name,
        ))?;

        let queue = Arc::new(BoundedHandoffQueue::new(options.queue_capacity));
        let state = Arc::new(RwLock::new(ReceiverState::Idle));
        let failure = Arc::new(Mutex::new(None));
        let should_stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(ReceiverCounters::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        *state.write() = ReceiverState::Running;
        let worker = ReceiveLoop {
            stream_name: options.stream_name.clone(),
            queue: Arc::clone(&queue),
            state: Arc::clone(&state),
            failure: Arc::clone(&failure),
            should_stop: Arc::clone(&should_stop),
            counters: Arc::clone(&counters),
        }
        .spawn(runtime, session, shutdown_rx)?;

        info!(capacity = queue.capacity(), "Receiver started");

        Ok(Self {
            stream_name: options.stream_name,
            queue,
            state,
            failure,
            should_stop,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
            counters,
        })
    }

    /// Take the next packet, waiting up to `timeout`.
    pub fn receive(&self, timeout: Duration) -> Result<Packet, ReceiveError> {
        match self.queue.pop(timeout) {
            Ok(packet) => Ok(packet),
            Err(PopError::Timeout) => Err(ReceiveError::Timeout),
            Err(PopError::Closed) => Err(ReceiveError::Closed {
                cause: self.failure.lock().clone(),
            }),
        }
    }

    /// Another consumer handle on the same queue.
    pub fn receiver_queue(&self) -> ReceiverQueue<Packet> {
        ReceiverQueue::new(Arc::clone(&self.queue))
    }

    /// The error that ended the stream, if it ended abnormally.
    pub fn failure(&self) -> Option<Arc<TransportError>> {
        self.failure.lock().clone()
    }

    /// Stream being received.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReceiverState {
        *self.state.read()
    }

    /// Counters so far.
    pub fn statistics(&self) -> ReceiverStatistics {
        self.counters.snapshot()
    }

    /// Stop the background loop and close the queue.
    ///
    /// Blocks until the loop has exited. Packets already buffered stay
    /// available to consumers. Calling this more than once is a no-op.
    #[instrument(name = "receiver_stop", skip(self), fields(stream = %self.stream_name))]
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        {
            let mut state = self.state.write();
            if state.is_running() {
                *state = ReceiverState::Stopping;
            }
        }

        self.should_stop.store(true, Ordering::SeqCst);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if worker.join().is_err() {
            error!("Receive loop panicked");
        }

        self.queue.close();
        *self.state.write() = ReceiverState::Stopped;
        info!("Receiver stopped");
    }
}

impl Drop for PacketReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared between the receiver handle and its background thread.
struct ReceiveLoop {
    stream_name: String,
    queue: Arc<BoundedHandoffQueue<Packet>>,
    state: Arc<RwLock<ReceiverState>>,
    failure: Arc<Mutex<Option<Arc<TransportError>>>>,
    should_stop: Arc<AtomicBool>,
    counters: Arc<ReceiverCounters>,
}

impl ReceiveLoop {
    fn spawn(
        self,
        runtime: Runtime,
        session: Session,
        shutdown: oneshot::Receiver<()>,
    ) -> Result<JoinHandle<()>, ConnectError> {
        std::thread::Builder::new()
            .name(format!("receiver-{}", self.stream_name))
            .spawn(move || runtime.block_on(self.run(session, shutdown)))
            .map_err(ConnectError::Runtime)
    }

    async fn run(self, mut session: Session, mut shutdown: oneshot::Receiver<()>) {
        let mut arrivals: u64 = 0;

        let outcome = loop {
            let frame = tokio::select! {
                _ = &mut shutdown => {
                    debug!("Shutdown signal received");
                    break None;
                }
                frame = session.read_frame() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Server ended the stream");
                    break None;
                }
                Err(e) => break Some(e),
            };

            match frame.kind {
                FrameKind::Packet => {
                    let packet = match codec::decode_packet(frame.body) {
                        Ok(packet) => packet,
                        Err(e) => break Some(e),
                    };
                    arrivals += 1;
                    let packet = packet.stamped(&self.stream_name, arrivals);
                    self.counters.record_received(packet.payload().len());
                    trace!(sequence = packet.sequence(), len = packet.payload().len(), "Received packet");

                    if !self.deliver(packet) {
                        break None;
                    }
                }
                FrameKind::Error => break Some(session::remote_error(&frame.body)),
                other => {
                    break Some(TransportError::Protocol(format!(
                        "unexpected {other:?} frame on a receive session"
                    )))
                }
            }
        };

        // Record before closing so consumers that see Closed also see the cause.
        if let Some(err) = outcome {
            error!("Receive loop failed: {}", err);
            *self.failure.lock() = Some(Arc::new(err));
        }
        {
            let mut state = self.state.write();
            if state.is_running() {
                *state = ReceiverState::Stopped;
            }
        }
        self.queue.close();
    }

    /// Push with a bounded wait so a full queue never blocks shutdown.
    /// Returns false if the packet was discarded.
    fn deliver(&self, mut packet: Packet) -> bool {
        let interval = Duration::from_millis(PUSH_RETRY_INTERVAL_MS);
        loop {
            match self.queue.push_timeout(packet, interval) {
                Ok(()) => return true,
                Err(PushError::Full(returned)) => {
                    if self.should_stop.load(Ordering::SeqCst) {
                        warn!("Dropping packet: shutdown while queue is full");
                        self.counters.record_dropped();
                        return false;
                    }
                    packet = returned;
                }
                Err(PushError::Closed(_)) => {
                    self.counters.record_dropped();
                    return false;
                }
            }
        }
    }
}
