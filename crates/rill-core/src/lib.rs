//! Typed dataflow execution engine on tokio.
//!
//! Independent units of work ("nodes") are wired into a chain by
//! single-producer/single-consumer hand-off channels and run
//! concurrently; their errors and the run's cancellation fold into one
//! combined outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌────────┐ wire  ┌────────┐ wire  ┌────────┐
//! │ node 1 │──────▶│ node 2 │──────▶│ node 3 │   one tokio task per node
//! └───┬────┘       └───┬────┘       └───┬────┘
//!     │                │                │        tagged failure reports
//!     └────────────────┼────────────────┘
//!                      ▼
//!             ┌─────────────────┐
//!             │  report stream  │  closed by the supervisor after every
//!             └────────┬────────┘  node has terminated
//!                      ▼
//!                   wait() → Ok | sole error | aggregate
//! ```
//!
//! Data flows strictly downstream through the wires. Cancellation flows
//! out-of-band through a shared `CancellationToken` that every node's
//! pending `recv`/`send`/`report` races against.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use rill_core::{nodes, wait, Chain};
//!
//! let numbers = nodes::source_iter(3i64..6);
//! let doubler = nodes::map(|n: i64| Ok(n * 2));
//! let mut total = 0;
//! let summer = nodes::each(move |n: i64| { total += n; Ok(()) });
//!
//! let reports = Chain::start(numbers)
//!     .then(doubler)
//!     .then(summer)
//!     .run(CancellationToken::new());
//! wait(reports).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod chain;
mod context;
mod env;
mod error;
mod node;
pub mod nodes;
mod observe;
mod run;
mod wire;

pub use chain::Chain;
pub use context::NodeContext;
pub use env::Env;
pub use error::{BoxError, ExitError, PipelineError};
pub use node::{BoxedNode, Node};
pub use observe::{MetricsSnapshot, NodeMetrics, NodeState};
pub use run::{run, run_with_env, wait, Reports};
pub use wire::connect;
