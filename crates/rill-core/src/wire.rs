//! Hand-off wires between adjacent node ports.
//!
//! A wire pairs exactly one producer's output with exactly one consumer's
//! input. The data channel is a bounded `mpsc` of capacity 1, a hand-off
//! slot rather than a queue. The teardown signalling rides on the channel
//! itself: dropping the write half is end-of-stream for the consumer, and
//! dropping the read half resolves any pending producer `send` with a
//! rejection.

use tokio::sync::mpsc;

use crate::node::Node;

/// Capacity of the hand-off slot between two adjacent nodes.
///
/// The smallest bound tokio supports. Deliberately not configurable.
pub(crate) const HANDOFF_CAPACITY: usize = 1;

/// Write half of a wire, installed on a producer's output port.
#[derive(Debug)]
pub(crate) struct WireOut<T> {
    pub(crate) tx: mpsc::Sender<T>,
}

/// Read half of a wire, installed on a consumer's input port.
#[derive(Debug)]
pub(crate) struct WireIn<T> {
    pub(crate) rx: mpsc::Receiver<T>,
}

/// Allocates a fresh, unowned wire.
pub(crate) fn pair<T>() -> (WireOut<T>, WireIn<T>) {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    (WireOut { tx }, WireIn { rx })
}

/// Connects `producer`'s output port to `consumer`'s input port with a
/// fresh wire.
///
/// Each port holds at most one wire. Fan-out and fan-in are unsupported:
/// reusing a port is a topology bug, not a runtime condition.
///
/// # Panics
///
/// Panics if either port is already wired.
pub fn connect<T, X, Y>(producer: &mut Node<X, T>, consumer: &mut Node<T, Y>)
where
    T: Send + 'static,
    X: Send + 'static,
    Y: Send + 'static,
{
    let (out, inp) = pair();
    producer.install_output(out);
    consumer.install_input(inp);
}
