//! Marking input files as processed
//!
//! A processed file is renamed with a leading dot (`dir/name` -> `dir/.name`).
//! Discovery skips dot-files, so a marked file is never loaded again.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Records that a file must not be processed again
///
/// Implementations must be idempotent: marking an already marked file succeeds
/// and never destroys data.
#[async_trait::async_trait]
pub trait FileMarker: Send + Sync {
    /// Mark `path` as processed and return where the file now lives
    async fn mark_processed(&self, path: &Path) -> Result<PathBuf>;
}

/// Marks files by prefixing their name with a dot
#[derive(Clone, Copy, Debug, Default)]
pub struct DotRenamer;

impl DotRenamer {
    /// Where `path` ends up once marked. `None` if it has no file name.
    pub fn marked_path(path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?;
        if is_marked(name) {
            return Some(path.to_path_buf());
        }
        let mut dotted = OsString::from(".");
        dotted.push(name);
        Some(path.with_file_name(dotted))
    }
}

/// Whether a file name carries the processed marker
pub fn is_marked(name: &std::ffi::OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

#[async_trait::async_trait]
impl FileMarker for DotRenamer {
    async fn mark_processed(&self, path: &Path) -> Result<PathBuf> {
        let marker_error = |message: String| Error::Marker {
            path: path.to_path_buf(),
            message,
        };

        let target =
            Self::marked_path(path).ok_or_else(|| marker_error("path has no file name".into()))?;
        if target == path {
            debug!(file = %path.display(), "File name already marked");
            return Ok(target);
        }

        let source_exists = tokio::fs::try_exists(path).await?;
        let target_exists = tokio::fs::try_exists(&target).await?;

        match (source_exists, target_exists) {
            (true, false) => {
                tokio::fs::rename(path, &target)
                    .await
                    .map_err(|e| marker_error(format!("rename failed: {e}")))?;
                info!(
                    file = %path.display(),
                    marked = %target.display(),
                    "Marked file as processed"
                );
                Ok(target)
            }
            (false, true) => {
                debug!(file = %path.display(), "File was already marked as processed");
                Ok(target)
            }
            (true, true) => Err(marker_error(format!(
                "{} already exists, refusing to overwrite",
                target.display()
            ))),
            (false, false) => Err(marker_error("file does not exist".into())),
        }
    }
}
