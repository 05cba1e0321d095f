//! Error types for pipeline execution.

use std::fmt;

/// Error currency crossing the node boundary.
///
/// Handlers return and report whatever error type they like; the engine
/// only ever forwards it, tagged with the originating node's label.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Frames an error *returned* by a handler, as opposed to one forwarded
/// through [`NodeContext::report`](crate::NodeContext::report).
#[derive(Debug, thiserror::Error)]
#[error("exited with error: {0}")]
pub struct ExitError(pub BoxError);

/// A failure drained from a run's report stream, or the folded outcome
/// of [`wait`](crate::wait).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A failure attributed to one node.
    Node {
        /// The node's diagnostic label: its name, else `#index`.
        label: String,
        /// The underlying failure.
        source: BoxError,
    },

    /// The run was cancelled before every node completed cleanly.
    Cancelled,

    /// Multiple failures from one run, in arrival order.
    Aggregate(Vec<PipelineError>),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { label, source } => write!(f, "node {label}: {source}"),
            Self::Cancelled => write!(f, "pipeline cancelled"),
            Self::Aggregate(reports) => {
                for (i, report) in reports.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{report}")?;
                }
                Ok(())
            }
        }
    }
}
