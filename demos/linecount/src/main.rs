//! Count the lines of a file through a rill pipeline.
//!
//! Wires a chunked file reader into a line splitter into a counting
//! sink, then waits for the combined outcome.
//!
//! # Running
//!
//! ```bash
//! cargo run -p rill-linecount -- path/to/file
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rill_core::{nodes, wait, Chain};

const CHUNK_SIZE: usize = 8192;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "README.md".to_string());
    let file = tokio::fs::File::open(&path).await?;

    let total = Arc::new(AtomicU64::new(0));
    let non_blank = Arc::new(AtomicU64::new(0));
    let count_total = Arc::clone(&total);
    let count_non_blank = Arc::clone(&non_blank);

    let reader = nodes::reader_source(file, CHUNK_SIZE).with_name("reader");
    let splitter = nodes::lines().with_name("lines");
    let counter = nodes::each(move |line: String| {
        count_total.fetch_add(1, Ordering::Relaxed);
        if !line.trim().is_empty() {
            count_non_blank.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })
    .with_name("counter");

    let reports = Chain::start(reader)
        .then(splitter)
        .then(counter)
        .run(CancellationToken::new());
    wait(reports).await?;
    tracing::debug!(path = %path, "pipeline finished");

    println!(
        "{path}: {} lines ({} non-blank)",
        total.load(Ordering::Relaxed),
        non_blank.load(Ordering::Relaxed)
    );
    Ok(())
}
