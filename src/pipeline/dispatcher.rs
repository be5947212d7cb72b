//! Line source: gzip decoding and feeding the bounded line queue
//!
//! Reading runs on a blocking thread and pushes with `blocking_send`, so a full
//! queue stalls the reader instead of dropping lines.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tokio::sync::mpsc;

/// Item travelling from the reader to the workers
#[derive(Debug, PartialEq)]
pub(crate) enum QueueItem {
    /// One trimmed, non-empty raw line
    Line(Vec<u8>),
    /// Stop token. Exactly one is sent per worker.
    Close,
}

/// What the reader managed to do
#[derive(Debug, Default)]
pub(crate) struct DispatchOutcome {
    /// Lines handed to the queue
    pub(crate) lines: u64,
    /// Why reading stopped early, if it did
    pub(crate) error: Option<String>,
}

impl DispatchOutcome {
    pub(crate) fn failed(lines: u64, error: impl ToString) -> Self {
        Self {
            lines,
            error: Some(error.to_string()),
        }
    }
}

/// Open a gzip-compressed file as a buffered line source
///
/// Every member of a concatenated gzip file is decoded, not just the first.
pub fn open_gzip(path: &Path) -> std::io::Result<BufReader<MultiGzDecoder<File>>> {
    let file = File::open(path)?;
    Ok(BufReader::new(MultiGzDecoder::new(file)))
}

/// Push every trimmed, non-empty line of `reader` into the queue.
///
/// Must run outside the async runtime (e.g. in `spawn_blocking`).
pub(crate) fn dispatch_lines<R: BufRead>(
    reader: R,
    tx: &mpsc::Sender<QueueItem>,
) -> DispatchOutcome {
    let mut lines = 0u64;
    for chunk in reader.split(b'\n') {
        let raw = match chunk {
            Ok(raw) => raw,
            Err(e) => return DispatchOutcome::failed(lines, e),
        };
        let line = raw.trim_ascii();
        if line.is_empty() {
            continue;
        }
        if tx.blocking_send(QueueItem::Line(line.to_vec())).is_err() {
            return DispatchOutcome::failed(lines, "line queue closed before the file was read");
        }
        lines += 1;
    }
    DispatchOutcome { lines, error: None }
}
