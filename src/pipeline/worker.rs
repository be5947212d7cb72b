//! Workers: parse, route, serialize and store one line at a time

use super::dispatcher::QueueItem;
use super::tally::Tally;
use crate::codec::UserApps;
use crate::parser::parse_line;
use crate::routing::RoutingTable;
use crate::store::ClientPool;
use crate::types::Outcome;
use prost::Message;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};

/// Receiving end of the line queue, shared by every worker of a file
pub(crate) type SharedQueue = Arc<Mutex<mpsc::Receiver<QueueItem>>>;

/// Turns one raw line into a store write
///
/// Shared by all workers of a run. Holds only read-only state plus the client pool.
pub struct LineProcessor {
    routes: Arc<RoutingTable>,
    pool: Arc<ClientPool>,
    dry_run: bool,
}

impl LineProcessor {
    /// Create a processor
    pub fn new(routes: Arc<RoutingTable>, pool: Arc<ClientPool>, dry_run: bool) -> Self {
        Self {
            routes,
            pool,
            dry_run,
        }
    }

    /// Handle one line end to end and report its outcome
    ///
    /// Never fails: malformed lines, unknown device types and store errors all
    /// become [`Outcome::Error`]. Writes are attempted once.
    pub async fn process_line(&self, line: &[u8]) -> Outcome {
        let record = match parse_line(line) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Skipping malformed line");
                return Outcome::Error;
            }
        };

        let Some(endpoint) = self.routes.route(&record.device_type) else {
            error!(device_type = %record.device_type, "Unknown device type");
            return Outcome::Error;
        };

        let key = record.store_key();
        let payload = UserApps::from(&record);

        if self.dry_run {
            debug!(endpoint, key = %key, payload = %payload.describe(), "Dry run, not writing");
            return Outcome::Processed;
        }

        let client = self.pool.get_or_create(endpoint);
        match client.set(&key, &payload.encode_to_vec()).await {
            Ok(()) => Outcome::Processed,
            Err(e) => {
                error!(endpoint, key = %key, error = %e, "Cannot write to store");
                Outcome::Error
            }
        }
    }
}

/// One consumer of the line queue
pub(crate) struct Worker {
    id: usize,
    queue: SharedQueue,
    tally: Arc<Tally>,
    processor: Arc<LineProcessor>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        queue: SharedQueue,
        tally: Arc<Tally>,
        processor: Arc<LineProcessor>,
    ) -> Self {
        Self {
            id,
            queue,
            tally,
            processor,
        }
    }

    /// Drain the queue until a close token arrives or the queue is closed.
    ///
    /// Returns the number of lines this worker handled.
    pub(crate) async fn run(self) -> u64 {
        let mut handled = 0u64;
        loop {
            // Lock only for the receive; processing happens unlocked
            let item = self.queue.lock().await.recv().await;
            match item {
                Some(QueueItem::Line(line)) => {
                    let outcome = self.processor.process_line(&line).await;
                    self.tally.record(outcome);
                    handled += 1;
                }
                Some(QueueItem::Close) | None => break,
            }
        }
        debug!(worker = self.id, handled, "Worker stopped");
        handled
    }
}
