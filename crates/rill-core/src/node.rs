//! Nodes: one concurrent stage wrapping a user handler.
//!
//! A [`Node`] owns a one-shot handler, an input port, and an output port
//! (either may stay unwired for source/sink roles). Submitted to a run,
//! it becomes a single tokio task with exclusive ownership of its wires;
//! when the handler finishes the wires close, the outcome is reported,
//! and the task terminates exactly once, whatever the outcome.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::context::NodeContext;
use crate::env::Env;
use crate::error::{BoxError, ExitError, PipelineError};
use crate::observe::{NodeMetrics, NodeState};
use crate::wire::{WireIn, WireOut};

/// Boxed one-shot handler bound to a typed context.
type Handler<I, O> =
    Box<dyn FnOnce(NodeContext<I, O>) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// A unit of work: a concurrent stage reading one input wire, doing
/// work, and writing one output wire.
///
/// Constructed detached, wired via [`connect`](crate::connect) or
/// [`Chain`](crate::Chain), and consumed by [`run`](crate::run).
/// Decorations ([`with_name`](Self::with_name),
/// [`catch_panics`](Self::catch_panics)) apply before submission only.
pub struct Node<I, O> {
    handler: Handler<I, O>,
    input: Option<WireIn<I>>,
    output: Option<WireOut<O>>,
    name: Option<String>,
    metrics: Arc<NodeMetrics>,
}

impl<I, O> Node<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Creates a detached node around `handler`.
    ///
    /// The handler runs exactly once. It must eventually return once it
    /// observes `None` from `recv`, `false` from `send`, or a cancelled
    /// run. A handler that ignores all three leaks its task, since the
    /// engine has no hard-kill mechanism.
    pub fn new<H, Fut>(handler: H) -> Self
    where
        H: FnOnce(NodeContext<I, O>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            handler: Box::new(move |ctx| handler(ctx).boxed()),
            input: None,
            output: None,
            name: None,
            metrics: Arc::new(NodeMetrics::default()),
        }
    }

    /// Sets the name used to tag this node's reports in place of
    /// `#index`.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Converts handler panics into ordinary error outcomes.
    ///
    /// Shorthand for [`catch_panics_with`](Self::catch_panics_with) with
    /// a translator that renders the panic payload as `panic: <message>`.
    #[must_use]
    pub fn catch_panics(self) -> Self {
        self.catch_panics_with(|payload| {
            format!("panic: {}", panic_message(payload.as_ref())).into()
        })
    }

    /// Converts handler panics into ordinary error outcomes using
    /// `translate`.
    ///
    /// An explicit per-node option: without it, a panic unwinds through
    /// the node's task and the run treats it as fatal for the whole
    /// process.
    #[must_use]
    pub fn catch_panics_with<F>(mut self, translate: F) -> Self
    where
        F: FnOnce(Box<dyn Any + Send>) -> BoxError + Send + 'static,
    {
        let handler = self.handler;
        self.handler = Box::new(move |ctx| {
            AssertUnwindSafe(handler(ctx))
                .catch_unwind()
                .map(|outcome| match outcome {
                    Ok(result) => result,
                    Err(payload) => Err(translate(payload)),
                })
                .boxed()
        });
        self
    }

    /// Handle for observing this node's state and counters while it
    /// runs. Diagnostics only.
    #[must_use]
    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub(crate) fn install_output(&mut self, wire: WireOut<O>) {
        assert!(
            self.output.is_none(),
            "output port already wired: fan-out is not supported"
        );
        self.output = Some(wire);
    }

    pub(crate) fn install_input(&mut self, wire: WireIn<I>) {
        assert!(
            self.input.is_none(),
            "input port already wired: fan-in is not supported"
        );
        self.input = Some(wire);
    }
}

/// Renders a panic payload the way the default hook would.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}

/// Everything a node receives from the orchestrator when submitted.
pub(crate) struct NodeBinding {
    pub(crate) index: usize,
    pub(crate) cancel: CancellationToken,
    pub(crate) reports: mpsc::Sender<PipelineError>,
    pub(crate) env: Arc<Env>,
}

/// Type-erased driver interface, so one run can hold nodes of
/// heterogeneous element types.
#[async_trait]
pub(crate) trait Drive: Send {
    async fn drive(self: Box<Self>, binding: NodeBinding);
}

/// A type-erased node, ready to submit to [`run`](crate::run).
///
/// Obtained from any `Node<I, O>` via `From`, or in bulk from
/// [`Chain::into_nodes`](crate::Chain::into_nodes).
pub struct BoxedNode(pub(crate) Box<dyn Drive>);

impl<I, O> From<Node<I, O>> for BoxedNode
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn from(node: Node<I, O>) -> Self {
        Self(Box::new(node))
    }
}

#[async_trait]
impl<I, O> Drive for Node<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn drive(self: Box<Self>, binding: NodeBinding) {
        let node = *self;
        let label = match node.name {
            Some(name) => name,
            None => format!("#{}", binding.index),
        };
        let metrics = node.metrics;
        metrics.set_state(NodeState::Processing);
        tracing::debug!(node = %label, "node started");

        let ctx = NodeContext {
            input: node.input,
            output: node.output,
            cancel: binding.cancel.clone(),
            reports: binding.reports.clone(),
            label: label.clone(),
            env: binding.env,
            metrics: Arc::clone(&metrics),
        };

        // The context moves into the handler and drops at handler
        // completion (the panic path included), closing both wires:
        // end-of-stream downstream, send-release upstream.
        let outcome = (node.handler)(ctx).await;

        match outcome {
            Ok(()) => {
                metrics.set_state(NodeState::Done);
                tracing::debug!(node = %label, "node finished");
            }
            Err(error) => {
                metrics.set_state(NodeState::Failed);
                tracing::warn!(node = %label, error = %error, "node exited with error");
                let report = PipelineError::Node {
                    label,
                    source: Box::new(ExitError(error)),
                };
                tokio::select! {
                    biased;

                    () = binding.cancel.cancelled() => {}
                    _ = binding.reports.send(report) => {}
                }
            }
        }
    }
}
