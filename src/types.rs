//! Core types for memc-load

use std::path::PathBuf;

/// One decoded input line: the apps installed on a device plus its location
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Device type, e.g. "idfa" or "gaid". Selects the store endpoint.
    pub device_type: String,
    /// Device identifier, unique within its device type
    pub device_id: String,
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
    /// Installed application ids, in input order
    pub apps: Vec<i64>,
}

impl Record {
    /// Key under which this record is stored: `device_type:device_id`
    pub fn store_key(&self) -> String {
        format!("{}:{}", self.device_type, self.device_id)
    }
}

/// Final outcome of one line. Each line produces exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Parsed, routed and written (or logged in dry-run mode)
    Processed,
    /// Malformed, unroutable or failed to write
    Error,
}

/// Point-in-time copy of a file's counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    /// Lines that were stored successfully
    pub processed: u64,
    /// Lines that failed at any stage
    pub errors: u64,
}

impl TallySnapshot {
    /// Total number of lines accounted for
    pub fn total(&self) -> u64 {
        self.processed + self.errors
    }

    /// `errors / processed`, or `None` when nothing was processed
    pub fn error_rate(&self) -> Option<f64> {
        if self.processed == 0 {
            None
        } else {
            Some(self.errors as f64 / self.processed as f64)
        }
    }
}

/// Data-quality verdict for one file
///
/// Independent of completion marking: a rejected file is still marked processed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    /// Nothing was processed; no error rate was computed
    Empty,
    /// Error rate below the threshold
    Accepted {
        /// errors / processed
        error_rate: f64,
    },
    /// Error rate at or above the threshold
    Rejected {
        /// errors / processed
        error_rate: f64,
        /// The threshold that was exceeded
        threshold: f64,
    },
}

impl Verdict {
    /// Apply the acceptance policy to a finished tally
    pub fn evaluate(tally: TallySnapshot, threshold: f64) -> Self {
        match tally.error_rate() {
            None => Verdict::Empty,
            Some(error_rate) if error_rate < threshold => Verdict::Accepted { error_rate },
            Some(error_rate) => Verdict::Rejected {
                error_rate,
                threshold,
            },
        }
    }

    /// Whether the file counts as a successful load
    pub fn is_success(&self) -> bool {
        !matches!(self, Verdict::Rejected { .. })
    }
}

/// What happened when the file was handed to the completion marker
#[derive(Clone, Debug, PartialEq)]
pub enum MarkStatus {
    /// File now lives at the given path and will not be picked up again
    Marked(PathBuf),
    /// Marking failed; the file may be processed again by a later run
    Failed(String),
}

/// Everything the pipeline learned about one file
#[derive(Clone, Debug)]
pub struct FileReport {
    /// The file as discovered
    pub path: PathBuf,
    /// Non-empty lines handed to workers
    pub lines_read: u64,
    /// Final counters
    pub tally: TallySnapshot,
    /// Set when the file could not be opened or read to the end
    pub read_error: Option<String>,
    /// Data-quality verdict
    pub verdict: Verdict,
    /// Completion marker outcome
    pub mark: MarkStatus,
}

/// Aggregate over all files of a run
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// Per-file reports in processing order
    pub files: Vec<FileReport>,
}

impl RunSummary {
    /// Files whose verdict was not a rejection and that were read to the end
    pub fn successful_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.verdict.is_success() && f.read_error.is_none())
            .count()
    }

    /// Sum of all per-file counters
    pub fn totals(&self) -> TallySnapshot {
        self.files
            .iter()
            .fold(TallySnapshot::default(), |acc, f| TallySnapshot {
                processed: acc.processed + f.tally.processed,
                errors: acc.errors + f.tally.errors,
            })
    }
}
