//! Input file discovery from a glob pattern
//!
//! The pattern is split into its literal directory prefix and the glob part.
//! Only the prefix is walked, and no deeper than the glob needs, unless the
//! pattern contains `**`. Files whose name starts with a dot are skipped: they
//! were marked as processed by an earlier run.

use crate::error::{Error, Result};
use crate::marker::is_marked;
use globset::GlobBuilder;
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// List unprocessed files matching `pattern`, sorted by path
///
/// A pattern without glob characters names a single file. A base directory that
/// does not exist yields an empty list.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern_error = |message: String| Error::Pattern {
        pattern: pattern.to_string(),
        message,
    };

    let (base, glob_depth) = split_pattern(Path::new(pattern));

    if glob_depth == 0 {
        let path = PathBuf::from(pattern);
        let visible = path.file_name().is_some_and(|name| !is_marked(name));
        return Ok(if visible && path.is_file() {
            vec![path]
        } else {
            Vec::new()
        });
    }

    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| pattern_error(e.to_string()))?
        .compile_matcher();

    let relative = base.as_os_str().is_empty();
    let root = if relative { PathBuf::from(".") } else { base };
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let max_depth = if pattern.contains("**") {
        usize::MAX
    } else {
        glob_depth
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path during discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_marked(entry.file_name()) {
            continue;
        }
        let candidate = if relative {
            entry.path().strip_prefix(".").unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if matcher.is_match(candidate) {
            files.push(candidate.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Literal directory prefix of `pattern` and the number of components after it
fn split_pattern(pattern: &Path) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut glob_depth = 0;
    for component in pattern.components() {
        let is_glob = matches!(
            component,
            Component::Normal(part) if has_glob_meta(&part.to_string_lossy())
        );
        if glob_depth > 0 || is_glob {
            glob_depth += 1;
        } else {
            base.push(component);
        }
    }
    (base, glob_depth)
}

fn has_glob_meta(part: &str) -> bool {
    part.contains(['*', '?', '[', '{'])
}
