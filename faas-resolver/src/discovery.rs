//! Recursive module file discovery.

use crate::manifest::IgnoreRules;
use faas_types::ModuleLoader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Walk `root` in file-name order and return every file some loader
/// handles, minus ignored files and the manifest itself.
///
/// Blocking; callers run it on the blocking pool.
pub(crate) fn discover(
    root: &Path,
    ignore: &IgnoreRules,
    manifest: &Path,
    loaders: &[Arc<dyn ModuleLoader>],
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path == manifest {
            continue;
        }
        if !loaders.iter().any(|l| l.handles(path)) {
            continue;
        }
        if ignore.is_ignored(root, path) {
            debug!(path = %path.display(), "ignored by manifest");
            continue;
        }
        files.push(path.to_path_buf());
    }
    files
}
