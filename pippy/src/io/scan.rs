//! Walking the project tree while skipping environments, VCS, and build output.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::io::project::EXCLUDE_DIRS;

/// Whether `relative` (to the project root) lies under an excluded directory.
///
/// Exclusions are anchored at the project root: a nested `pkg/build/` is
/// ordinary source.
pub fn is_excluded(relative: &Path) -> bool {
    EXCLUDE_DIRS.iter().any(|dir| relative.starts_with(dir))
}

fn keep(root: &Path, entry: &DirEntry) -> bool {
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    !is_excluded(relative)
}

/// All `.py` files under `root`, sorted, outside excluded directories.
///
/// Unreadable entries are skipped.
pub fn find_python_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| keep(root, entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("py")))
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Cache artifacts under `root`: `__pycache__` directories and stray
/// `*.pyc`/`*.pyo` files. Environments and other excluded trees are left alone.
pub fn find_cache_artifacts(root: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.file_name() == OsStr::new("__pycache__") || keep(root, entry)
        });
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_dir() && entry.file_name() == OsStr::new("__pycache__") {
            dirs.push(entry.into_path());
            walker.skip_current_dir();
            continue;
        }
        let is_bytecode = matches!(
            entry.path().extension().and_then(OsStr::to_str),
            Some("pyc" | "pyo")
        );
        if entry.file_type().is_file() && is_bytecode {
            files.push(entry.into_path());
        }
    }
    dirs.sort();
    files.sort();
    (dirs, files)
}
