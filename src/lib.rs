//! # memc-load
//!
//! Concurrent loader of gzip-compressed "installed apps" logs into memcached.
//!
//! Every line of an input file describes one device:
//! `device_type<TAB>device_id<TAB>lat<TAB>lon<TAB>app_id[,app_id...]`.
//! Lines are parsed, routed by device type to a memcached endpoint, encoded as
//! a protobuf `UserApps` message and stored under `device_type:device_id`.
//!
//! Each file is streamed into a bounded queue drained by a fixed pool of
//! workers. When the file is done its error rate decides whether the load is
//! accepted, and the file is renamed with a leading dot so it is not loaded
//! again.
//!
//! ## Quick Start
//!
//! ```no_run
//! use memc_load::{Config, Loader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         pattern: "/data/appsinstalled/*.tsv.gz".to_string(),
//!         workers: 16,
//!         ..Default::default()
//!     };
//!
//!     let summary = Loader::with_memcache(config)?.run().await?;
//!     println!("{} of {} files loaded", summary.successful_files(), summary.files.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Protobuf payload encoding
pub mod codec;
/// Configuration types
pub mod config;
/// Input file discovery
pub mod discovery;
/// Error types
pub mod error;
/// Run orchestration
pub mod loader;
/// Processed-file marking
pub mod marker;
/// Input line parsing
pub mod parser;
/// Per-file processing pipeline (decomposed into focused submodules)
pub mod pipeline;
/// Device type to endpoint routing
pub mod routing;
/// Built-in self-test
pub mod selftest;
/// Key-value store clients
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use codec::UserApps;
pub use config::{Config, StoreConfig};
pub use error::{Error, ParseError, Result, StoreError};
pub use loader::Loader;
pub use marker::{DotRenamer, FileMarker};
pub use pipeline::{FilePipeline, LineProcessor, Tally};
pub use routing::RoutingTable;
pub use store::{ClientPool, MemcacheClient, MemcacheConnector, StoreClient, StoreConnector};
pub use types::{FileReport, MarkStatus, Outcome, Record, RunSummary, TallySnapshot, Verdict};
