//! The handler's window into a running pipeline.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::env::Env;
use crate::error::{BoxError, PipelineError};
use crate::observe::{NodeMetrics, NodeState};
use crate::wire::{WireIn, WireOut};

/// Per-node capability handle: the only surface a handler sees.
///
/// Bound at spawn time to the run's cancellation token, the node's two
/// wires, the shared report channel, and the node's diagnostic label.
/// The handler owns it for exactly one invocation; the wires close when
/// it drops.
///
/// Every blocking operation here races against cancellation, with the
/// cancellation arm checked first, so a cancelled run degrades `recv`
/// and `send` to "no more work" signals instead of hanging.
pub struct NodeContext<I, O> {
    pub(crate) input: Option<WireIn<I>>,
    pub(crate) output: Option<WireOut<O>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) reports: mpsc::Sender<PipelineError>,
    pub(crate) label: String,
    pub(crate) env: Arc<Env>,
    pub(crate) metrics: Arc<NodeMetrics>,
}

impl<I, O> NodeContext<I, O> {
    /// Receives the next value from the input wire.
    ///
    /// Resolves to `None` once the producer has closed its end of the
    /// wire (end-of-stream) or the run is cancelled, whichever happens
    /// first. An unwired input (the source role) pends until
    /// cancellation.
    pub async fn recv(&mut self) -> Option<I> {
        self.metrics.set_state(NodeState::Recv);
        let value = match self.input.as_mut() {
            Some(wire) => tokio::select! {
                biased;

                () = self.cancel.cancelled() => None,
                value = wire.rx.recv() => value,
            },
            None => {
                self.cancel.cancelled().await;
                None
            }
        };
        match value {
            Some(_) => {
                self.metrics.record_recv();
                self.metrics.set_state(NodeState::Processing);
            }
            None => self.metrics.set_state(NodeState::Idle),
        }
        value
    }

    /// Delivers `value` to the consumer on the output wire.
    ///
    /// Resolves to `false` when the run is cancelled or the consumer has
    /// already terminated. A `false` return is the designed wind-down
    /// signal, telling the handler to stop producing; it is not an error.
    /// An unwired output (the sink role) pends until cancellation.
    pub async fn send(&self, value: O) -> bool {
        self.metrics.set_state(NodeState::Send);
        let accepted = match self.output.as_ref() {
            Some(wire) => tokio::select! {
                biased;

                () = self.cancel.cancelled() => false,
                result = wire.tx.send(value) => result.is_ok(),
            },
            None => {
                self.cancel.cancelled().await;
                false
            }
        };
        if accepted {
            self.metrics.record_send();
            self.metrics.set_state(NodeState::Processing);
        } else {
            self.metrics.set_state(NodeState::Idle);
        }
        accepted
    }

    /// Lazy, one-pass stream of input values.
    ///
    /// Ends at the first `recv()` that resolves to `None`; not
    /// restartable, since it consumes the wire. Borrows the context
    /// mutably, so it suits consuming stages; transform stages that
    /// interleave sends should loop on [`recv`](Self::recv) directly.
    pub fn stream(&mut self) -> impl Stream<Item = I> + '_ {
        futures::stream::unfold(self, |ctx| async move {
            ctx.recv().await.map(|value| (value, ctx))
        })
    }

    /// Forwards a diagnostic to the run's report stream, tagged with
    /// this node's label.
    ///
    /// Blocks until the report is accepted or the run is cancelled, and
    /// returns whether it was accepted. Reporting never stops the
    /// handler; return an error to terminate instead.
    pub async fn report(&self, error: impl Into<BoxError>) -> bool {
        let report = PipelineError::Node {
            label: self.label.clone(),
            source: error.into(),
        };
        let accepted = tokio::select! {
            biased;

            () = self.cancel.cancelled() => false,
            result = self.reports.send(report) => result.is_ok(),
        };
        if accepted {
            self.metrics.record_report();
        }
        accepted
    }

    /// Non-blocking probe of the run's cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run's cancellation signal fires.
    ///
    /// For handlers running their own `select!` loops alongside work the
    /// context protocol cannot see.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Returns the run-scoped value of type `T`.
    ///
    /// # Panics
    ///
    /// Panics if no value of type `T` was attached before the run; that
    /// is a configuration bug, not a runtime condition.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> &T {
        self.env.get()
    }

    /// This node's diagnostic label: its name, else `#index`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}
