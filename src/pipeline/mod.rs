//! Per-file processing pipeline
//!
//! Split into focused submodules:
//! - [`tally`] - Shared processed/error counters
//! - `dispatcher` - Gzip line source feeding the bounded queue
//! - [`worker`] - Queue consumers doing parse, route, serialize and store
//!
//! [`FilePipeline`] wires them together for one file: it starts the workers,
//! streams the file into the queue, sends one close token per worker, waits for
//! them, judges the error rate and finally hands the file to the completion
//! marker.

mod dispatcher;
pub mod tally;
pub mod worker;


pub use dispatcher::open_gzip;
pub use tally::Tally;
pub use worker::LineProcessor;

use crate::config::Config;
use crate::marker::FileMarker;
use crate::routing::RoutingTable;
use crate::store::ClientPool;
use crate::types::{FileReport, MarkStatus, TallySnapshot, Verdict};
use dispatcher::{DispatchOutcome, QueueItem, dispatch_lines};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};
use worker::Worker;

/// Result of draining one line source, before judging and marking
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRun {
    /// Non-empty lines handed to workers
    pub lines_read: u64,
    /// Why reading stopped early, if it did
    pub read_error: Option<String>,
    /// Final counters
    pub tally: TallySnapshot,
}

/// Processes files one at a time with a fixed pool of workers each
pub struct FilePipeline {
    workers: usize,
    queue_capacity: usize,
    max_error_rate: f64,
    processor: Arc<LineProcessor>,
    pool: Arc<ClientPool>,
    marker: Arc<dyn FileMarker>,
}

impl FilePipeline {
    /// Build a pipeline from a validated configuration
    ///
    /// `pool` lives for the whole run so endpoint clients are reused across files.
    pub fn new(config: &Config, pool: Arc<ClientPool>, marker: Arc<dyn FileMarker>) -> Self {
        let routes = Arc::new(RoutingTable::from(config));
        let processor = Arc::new(LineProcessor::new(routes, pool.clone(), config.dry_run));
        Self {
            workers: config.workers.max(1),
            queue_capacity: config.queue_capacity.max(1),
            max_error_rate: config.max_error_rate,
            processor,
            pool,
            marker,
        }
    }

    /// Client pool shared by every file this pipeline processes
    pub fn client_pool(&self) -> &Arc<ClientPool> {
        &self.pool
    }

    /// Load one gzip file, judge it and mark it processed
    ///
    /// Never fails: open/read failures end up in [`FileReport::read_error`] and
    /// marker failures in [`FileReport::mark`]. The file is marked whatever the
    /// verdict, so it is not loaded twice.
    pub async fn process_file(&self, path: &Path) -> FileReport {
        info!(file = %path.display(), workers = self.workers, "Processing file");

        let source = path.to_path_buf();
        let run = self.run_source(move || open_gzip(&source)).await;

        if let Some(ref e) = run.read_error {
            error!(file = %path.display(), error = %e, "Error reading file");
        }
        debug!(
            file = %path.display(),
            lines = run.lines_read,
            processed = run.tally.processed,
            errors = run.tally.errors,
            "File drained"
        );

        let verdict = Verdict::evaluate(run.tally, self.max_error_rate);
        log_verdict(path, &verdict);

        let mark = match self.marker.mark_processed(path).await {
            Ok(marked) => MarkStatus::Marked(marked),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to mark file as processed");
                MarkStatus::Failed(e.to_string())
            }
        };

        FileReport {
            path: path.to_path_buf(),
            lines_read: run.lines_read,
            tally: run.tally,
            read_error: run.read_error,
            verdict,
            mark,
        }
    }

    /// Feed every line produced by `open` through the worker pool
    ///
    /// `open` runs on a blocking thread; an error from it counts as a read
    /// failure with zero lines.
    pub async fn run_source<F, R>(&self, open: F) -> SourceRun
    where
        F: FnOnce() -> std::io::Result<R> + Send + 'static,
        R: BufRead + 'static,
    {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let queue = Arc::new(Mutex::new(rx));
        let tally = Arc::new(Tally::new());

        let workers: Vec<_> = (0..self.workers)
            .map(|id| {
                let worker = Worker::new(id, queue.clone(), tally.clone(), self.processor.clone());
                tokio::spawn(worker.run())
            })
            .collect();
        // Only workers may hold the receiver, so the reader notices if they all die
        drop(queue);

        let producer_tx = tx.clone();
        let dispatched = tokio::task::spawn_blocking(move || match open() {
            Ok(reader) => dispatch_lines(reader, &producer_tx),
            Err(e) => DispatchOutcome::failed(0, e),
        })
        .await
        .unwrap_or_else(|e| DispatchOutcome::failed(0, format!("reader task failed: {e}")));

        for _ in 0..self.workers {
            if tx.send(QueueItem::Close).await.is_err() {
                break;
            }
        }
        drop(tx);

        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task failed");
            }
        }

        SourceRun {
            lines_read: dispatched.lines,
            read_error: dispatched.error,
            tally: tally.snapshot(),
        }
    }
}

fn log_verdict(path: &Path, verdict: &Verdict) {
    match *verdict {
        Verdict::Empty => {
            info!(file = %path.display(), "No records processed, nothing to evaluate");
        }
        Verdict::Accepted { error_rate } => {
            info!(file = %path.display(), error_rate, "Acceptable error rate. Successful load");
        }
        Verdict::Rejected {
            error_rate,
            threshold,
        } => {
            error!(
                file = %path.display(),
                error_rate,
                threshold,
                "High error rate. Failed load"
            );
        }
    }
}
