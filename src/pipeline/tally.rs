//! Per-file outcome counters

use crate::types::{Outcome, TallySnapshot};
use std::sync::{Mutex, PoisonError};

/// Thread-safe processed/error counters for one file
///
/// Both counters live behind one lock so a snapshot is always consistent.
#[derive(Debug, Default)]
pub struct Tally {
    counts: Mutex<TallySnapshot>,
}

impl Tally {
    /// Create a tally with both counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one line outcome
    pub fn record(&self, outcome: Outcome) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Outcome::Processed => counts.processed += 1,
            Outcome::Error => counts.errors += 1,
        }
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> TallySnapshot {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
