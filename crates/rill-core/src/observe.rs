//! Diagnostics-only node observability.
//!
//! Each node carries an [`NodeMetrics`] readable from any thread through
//! the handle returned by [`Node::metrics`](crate::Node::metrics), in the
//! same shape as a task handle's lock-free counters. Nothing here is
//! load-bearing for correctness.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Observable lifecycle state of a node. Purely descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    /// Constructed, not yet submitted to a run.
    New = 0,
    /// Blocked receiving from the input wire.
    Recv = 1,
    /// Inside the handler, between protocol calls.
    Processing = 2,
    /// Blocked delivering to the output wire.
    Send = 3,
    /// Saw end-of-stream, a rejected send, or cancellation; winding down.
    Idle = 4,
    /// Handler returned successfully.
    Done = 5,
    /// Handler returned an error.
    Failed = 6,
}

impl NodeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Recv,
            2 => Self::Processing,
            3 => Self::Send,
            4 => Self::Idle,
            5 => Self::Done,
            6 => Self::Failed,
            _ => Self::New,
        }
    }
}

/// Per-node state and counters (lock-free atomic reads).
#[derive(Debug, Default)]
pub struct NodeMetrics {
    state: AtomicU8,
    received: AtomicU64,
    sent: AtomicU64,
    reported: AtomicU64,
}

impl NodeMetrics {
    pub(crate) fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub(crate) fn record_recv(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_report(&self) {
        self.reported.fetch_add(1, Ordering::Relaxed);
    }

    /// The node's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            state: self.state(),
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            reported: self.reported.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a node's [`NodeMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Lifecycle state at snapshot time.
    pub state: NodeState,
    /// Values received from the input wire.
    pub received: u64,
    /// Values delivered to the output wire.
    pub sent: u64,
    /// Diagnostics accepted onto the report stream.
    pub reported: u64,
}
