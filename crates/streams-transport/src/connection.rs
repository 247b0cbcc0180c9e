//! Receiver lifecycle state and transport statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle of a packet receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverState {
    /// Not started.
    #[default]
    Idle,

    /// Background loop is reading from the server.
    Running,

    /// Shutdown requested, waiting for the loop to exit.
    Stopping,

    /// Loop has exited. No further packets will be produced.
    Stopped,
}

impl ReceiverState {
    /// Check if the receive loop is running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if the receiver can no longer produce packets.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Human-readable state.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stopping => "Stopping...",
            Self::Stopped => "Stopped",
        }
    }
}

/// Receiver counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverStatistics {
    pub packets_received: u64,
    pub bytes_received: u64,
    /// Packets read from the server but discarded because shutdown began
    /// while the queue was full.
    pub packets_dropped: u64,
}

/// Sender counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderStatistics {
    pub packets_sent: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ReceiverCounters {
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    packets_dropped: AtomicU64,
}

impl ReceiverCounters {
    pub(crate) fn record_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ReceiverStatistics {
        ReceiverStatistics {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SenderCounters {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl SenderCounters {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SenderStatistics {
        SenderStatistics {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}
