//! Run orchestration: discover input files and load them one at a time

use crate::config::Config;
use crate::discovery::discover;
use crate::error::Result;
use crate::marker::{DotRenamer, FileMarker};
use crate::pipeline::FilePipeline;
use crate::routing::RoutingTable;
use crate::store::{ClientPool, MemcacheConnector, StoreConnector};
use crate::types::RunSummary;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Loads every file matching the configured pattern
///
/// Owns one [`ClientPool`] for the whole run, so store connections opened for
/// the first file are reused by the next ones.
pub struct Loader {
    config: Config,
    pipeline: FilePipeline,
}

impl Loader {
    /// Create a loader with explicit store and marker backends
    ///
    /// Fails if the configuration is invalid.
    pub fn new(
        config: Config,
        connector: Arc<dyn StoreConnector>,
        marker: Arc<dyn FileMarker>,
    ) -> Result<Self> {
        config.validate()?;
        let routes = RoutingTable::from(&config);
        info!(
            endpoints = ?routes.endpoints(),
            device_types = routes.len(),
            workers = config.workers,
            dry_run = config.dry_run,
            "Store endpoints resolved"
        );
        let pool = Arc::new(ClientPool::new(connector));
        let pipeline = FilePipeline::new(&config, pool, marker);
        Ok(Self { config, pipeline })
    }

    /// Create a loader writing to memcached and marking files with a dot prefix
    pub fn with_memcache(config: Config) -> Result<Self> {
        let connector = Arc::new(MemcacheConnector::new(config.store.clone()));
        Self::new(config, connector, Arc::new(DotRenamer))
    }

    /// Discover input files and process them in path order
    ///
    /// Only an invalid pattern fails the run; per-file problems end up in the
    /// returned summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let files = discover(&self.config.pattern)?;
        if files.is_empty() {
            warn!(pattern = %self.config.pattern, "No files match the pattern");
        }
        Ok(self.process_files(&files).await)
    }

    /// Process the given files strictly one after another
    pub async fn process_files(&self, files: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::default();
        for path in files {
            summary.files.push(self.pipeline.process_file(path).await);
        }

        let totals = summary.totals();
        info!(
            files = summary.files.len(),
            successful = summary.successful_files(),
            processed = totals.processed,
            errors = totals.errors,
            "Run finished"
        );
        summary
    }
}
