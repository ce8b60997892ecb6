//! Input discovery: find every supported document under the input directory.

use crate::format::is_supported;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Find supported documents in `directory`.
///
/// * Only the directory itself is scanned unless `recursive` is set.
/// * Files whose name starts with `.` are skipped (editor lock files,
///   `.DS_Store` and the like).
/// * Anything whose canonical path lies under one of `exclude_dirs` is
///   skipped, so an output directory nested in the input tree never feeds
///   back into the scan.
///
/// The result is sorted for a deterministic processing order. Unreadable
/// entries are logged and skipped; scanning never fails.
pub fn scan_documents(
    directory: &Path,
    recursive: bool,
    exclude_dirs: &[PathBuf],
) -> Vec<PathBuf> {
    let excludes: Vec<PathBuf> = exclude_dirs
        .iter()
        .filter_map(|dir| match dir.canonicalize() {
            Ok(p) => Some(p),
            Err(e) => {
                debug!("Exclude dir {} ignored: {e}", dir.display());
                None
            }
        })
        .collect();

    let mut walker = WalkDir::new(directory).min_depth(1).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                debug!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|path| path.is_file() && !is_hidden(path) && is_supported(path))
        .filter(|path| match path.canonicalize() {
            Ok(real) => !excludes.iter().any(|ex| real.starts_with(ex)),
            Err(e) => {
                debug!("Skipping {}: {e}", path.display());
                false
            }
        })
        .collect();

    files.sort();
    debug!(
        "Found {} supported document(s) in {}",
        files.len(),
        directory.display()
    );
    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
