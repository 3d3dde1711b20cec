//! Source resolution: logical source names to concrete files.
//!
//! A named source is declared in `sources_map.json` as either a fixed
//! relative path or a glob pattern, both interpreted under the data root.
//! Resolution happens fresh on every run - monthly files appear and
//! disappear between runs, and the freshness layer depends on seeing the
//! current file set, not a remembered one.
//!
//! Pattern matching compiles the glob once and tests it against paths
//! relative to the data root while walking the tree. Symlinks are not
//! followed, and results are sorted so that downstream logs, freshness
//! records, and error messages are reproducible.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::config::SourceSpec;

/// Resolves a source declaration to the list of currently existing files.
///
/// - A `pattern` spec returns every regular file under `data_root` whose
///   root-relative path matches the glob, sorted lexicographically.
/// - A `path` spec returns a single-element list if the file exists, and an
///   empty list otherwise.
///
/// Zero matches is a valid result, not an error: the caller decides whether
/// an empty source is skippable or fatal.
pub fn resolve_source_files(spec: &SourceSpec, data_root: &Path) -> Result<Vec<PathBuf>> {
    match spec {
        SourceSpec::Pattern { pattern } => expand_pattern(pattern, data_root),
        SourceSpec::Path { path } => {
            let full = data_root.join(path);
            Ok(if full.is_file() { vec![full] } else { Vec::new() })
        }
    }
}

/// Expands a glob pattern relative to the data root.
fn expand_pattern(pattern: &str, data_root: &Path) -> Result<Vec<PathBuf>> {
    let compiled =
        Pattern::new(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut matches = Vec::new();
    for entry in WalkDir::new(data_root)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if let Ok(relative) = path.strip_prefix(data_root) {
            let relative_str = relative.to_string_lossy();
            trace!("checking path: {relative_str}");
            if compiled.matches(&relative_str) {
                matches.push(path.to_path_buf());
            }
        }
    }

    matches.sort();
    debug!("pattern '{pattern}' matched {} file(s)", matches.len());
    Ok(matches)
}
