//! Discovery of helper files, sources and submodules under a project root.
//!
//! A single depth-first walk classifies every `.go` file. Directories below
//! the root that carry their own `go.mod` are recorded as submodules and not
//! descended into; they are processed later as independent projects.

pub mod markers;

use globset::GlobSet;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;

pub use markers::{classify_line, ImportAlias, Marker};

/// The host language's module manifest.
pub const MODULE_MANIFEST: &str = "go.mod";

/// Source file extension.
pub const SOURCE_EXTENSION: &str = "go";

/// Directory names the Go tool itself ignores.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata"];

/// Result of walking one project root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Files bearing the activation marker, sorted by path.
    pub helper_files: Vec<PathBuf>,
    /// Every other candidate, in walk order.
    pub sources: Vec<PathBuf>,
    /// Nested module roots, in walk order.
    pub submodules: Vec<PathBuf>,
}

/// Walk `root` and classify its files.
pub fn discover(root: &Path, config: &Config) -> anyhow::Result<Discovery> {
    let excluded = config.excluded_matcher()?;
    let mut discovery = Discovery::default();
    let mut candidates = Vec::new();

    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            if entry.depth() == 0 {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if is_skipped_dir(&name) || is_excluded(&excluded, root, path) {
                walker.skip_current_dir();
                continue;
            }
            if path.join(MODULE_MANIFEST).is_file() {
                discovery.submodules.push(path.to_path_buf());
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_file() && is_candidate(path) && !is_excluded(&excluded, root, path) {
            candidates.push(path.to_path_buf());
        }
    }

    let activations = probe_activation(&candidates, config.scan_threads)?;
    for (path, is_helper) in candidates.into_iter().zip(activations) {
        if is_helper {
            discovery.helper_files.push(path);
        } else {
            discovery.sources.push(path);
        }
    }
    discovery.helper_files.sort();

    Ok(discovery)
}

/// Peek at every candidate in parallel, bounded to `threads` workers.
///
/// Results are returned in the same order as `candidates`.
fn probe_activation(candidates: &[PathBuf], threads: usize) -> anyhow::Result<Vec<bool>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;

    pool.install(|| {
        candidates
            .par_iter()
            .map(|path| {
                markers::peek_activation(path)
                    .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))
            })
            .collect()
    })
}

fn is_candidate(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
}

/// Hidden and `_`-prefixed directories are ignored by the Go tool, and by us.
fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name)
}

fn is_excluded(excluded: &GlobSet, root: &Path, path: &Path) -> bool {
    if excluded.is_empty() {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    excluded.is_match(relative)
}
