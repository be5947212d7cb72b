//! Error types for memc-load
//!
//! Errors are split by how far they are allowed to travel:
//! - [`ParseError`] and [`StoreError`] are per-line failures. Workers absorb them
//!   into the file's tally and they never unwind past a worker.
//! - [`Error`] is the run-level error. Only configuration problems, discovery
//!   failures and unexpected I/O surface through it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for memc-load operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for memc-load
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// File discovery pattern could not be compiled or walked
    #[error("invalid file pattern `{pattern}`: {message}")]
    Pattern {
        /// The pattern as given on the command line or in the config
        pattern: String,
        /// What went wrong
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration could not be decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A file could not be marked as processed
    #[error("cannot mark {} as processed: {message}", path.display())]
    Marker {
        /// The file being marked
        path: PathBuf,
        /// Why marking failed
        message: String,
    },

    /// The serialization self-test found a mismatch
    #[error("self-test failed: {0}")]
    SelfTest(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Reasons a single input line does not yield a record
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Line is not valid UTF-8
    #[error("line is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// Fewer than five tab-separated fields
    #[error("expected 5 tab-separated fields, found {found}")]
    MissingFields {
        /// Number of fields actually present
        found: usize,
    },

    /// More than five tab-separated fields
    #[error("expected 5 tab-separated fields, found {found}")]
    TooManyFields {
        /// Number of fields actually present
        found: usize,
    },

    /// Device type or device id is empty
    #[error("device type and device id must be non-empty")]
    EmptyIdentifier,

    /// Latitude or longitude is not a finite decimal number
    #[error("invalid {field} `{value}`")]
    InvalidGeo {
        /// "lat" or "lon"
        field: &'static str,
        /// The raw field value
        value: String,
    },
}

/// Failures of a single store write
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not establish a connection to the endpoint
    #[error("cannot connect to {address}: {source}")]
    Connect {
        /// Endpoint address
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Connection broke while writing or reading the reply
    #[error("I/O error talking to store: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint did not answer in time
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with something other than a successful store
    #[error("store rejected write: {response}")]
    Rejected {
        /// First line of the server reply
        response: String,
    },

    /// Key cannot be sent over the wire protocol
    #[error("invalid store key `{0}`")]
    InvalidKey(String),
}

impl StoreError {
    /// Whether the connection that produced this error can still be reused.
    ///
    /// A rejection is a well-formed server reply, so the stream is still in sync.
    /// Everything else leaves the stream in an unknown state.
    pub fn keeps_connection(&self) -> bool {
        matches!(self, StoreError::Rejected { .. } | StoreError::InvalidKey(_))
    }
}
