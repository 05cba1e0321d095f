//! Orchestration: start every node, aggregate their reports.
//!
//! [`run`] spawns one tokio task per node plus one supervisor. The
//! supervisor joins every node task, then closes the report stream:
//! the single authoritative "pipeline finished" signal, emitted exactly
//! once and only after every node has terminated and released its
//! wires. [`wait`] drains that stream to closure and folds it into one
//! outcome.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::env::Env;
use crate::error::PipelineError;
use crate::node::{BoxedNode, NodeBinding};

/// Capacity of the shared report channel. Like the wires, a hand-off
/// slot rather than a queue.
const REPORT_CAPACITY: usize = 1;

/// The stream of tagged failure reports from one run.
///
/// Drain it (with [`wait`], [`recv`](Reports::recv), or as a
/// [`Stream`]) until it closes; reports may start arriving the moment
/// [`run`] returns.
#[derive(Debug)]
#[must_use = "a run's reports must be drained to observe its outcome"]
pub struct Reports {
    rx: mpsc::Receiver<PipelineError>,
}

impl Reports {
    /// Receives the next report; `None` once the run has finished.
    pub async fn recv(&mut self) -> Option<PipelineError> {
        self.rx.recv().await
    }
}

impl Stream for Reports {
    type Item = PipelineError;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts every node concurrently and returns the run's report stream.
///
/// `nodes` must already be wired into a connected topology; their order
/// only assigns the 1-based indexes used in diagnostic labels.
///
/// Cancellation is cooperative: firing `cancel` unblocks every pending
/// `recv`/`send`/`report` across all nodes, but a handler stuck in
/// blocking work the context cannot see is never preempted; adapters
/// around such work must make it cancellation-aware themselves.
pub fn run(cancel: CancellationToken, nodes: impl IntoIterator<Item = BoxedNode>) -> Reports {
    run_with_env(cancel, Env::new(), nodes)
}

/// [`run`], with run-scoped values attached for handlers to read via
/// [`NodeContext::get`](crate::NodeContext::get).
pub fn run_with_env(
    cancel: CancellationToken,
    env: Env,
    nodes: impl IntoIterator<Item = BoxedNode>,
) -> Reports {
    let env = Arc::new(env);
    let (tx, rx) = mpsc::channel(REPORT_CAPACITY);

    let mut handles = Vec::new();
    for (position, node) in nodes.into_iter().enumerate() {
        let binding = NodeBinding {
            index: position + 1,
            cancel: cancel.clone(),
            reports: tx.clone(),
            env: Arc::clone(&env),
        };
        handles.push(tokio::spawn(node.0.drive(binding)));
    }
    tracing::debug!(nodes = handles.len(), "pipeline started");

    tokio::spawn(async move {
        for handle in handles {
            if let Err(join_error) = handle.await {
                if join_error.is_panic() {
                    // A panic no catch_panics guard translated: fatal
                    // for the whole process, never silently downgraded
                    // to a report.
                    tracing::error!(error = %join_error, "node panicked without a panic guard");
                    std::process::abort();
                }
            }
        }
        if cancel.is_cancelled() {
            // Best effort: if nobody is draining the stream at this
            // instant, the cancellation outcome is dropped rather than
            // wedging teardown.
            let _ = tx.try_send(PipelineError::Cancelled);
        }
        tracing::debug!("all nodes terminated; report stream closing");
        drop(tx);
    });

    Reports { rx }
}

/// Drains `reports` to closure and folds them into one outcome.
///
/// `Ok(())` for a clean run; the sole error when exactly one was
/// reported; otherwise [`PipelineError::Aggregate`] in arrival order.
/// Never blocks past the last node's termination, provided every
/// handler honors the wind-down contract.
pub async fn wait(mut reports: Reports) -> Result<(), PipelineError> {
    let mut drained = Vec::new();
    while let Some(report) = reports.recv().await {
        drained.push(report);
    }
    match drained.len() {
        0 => Ok(()),
        1 => Err(drained.remove(0)),
        _ => Err(PipelineError::Aggregate(drained)),
    }
}
