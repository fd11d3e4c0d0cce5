//! Orchestration for `pippy clean`.

use std::fs;

use anyhow::Result;
use tracing::{debug, info};

use crate::io::project::ProjectContext;
use crate::io::report::Reporter;
use crate::io::scan::find_cache_artifacts;

/// Counts of what `clean` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOutcome {
    pub dirs: usize,
    pub files: usize,
}

/// Remove `__pycache__` directories and `*.pyc`/`*.pyo` files outside excluded trees.
///
/// Entries that cannot be removed are warned about and skipped.
pub fn clean_caches(ctx: &ProjectContext, reporter: &dyn Reporter) -> Result<CleanOutcome> {
    info!(project = %ctx.root().display(), "cleaning Python cache files");
    let (dirs, files) = find_cache_artifacts(ctx.root());
    let mut outcome = CleanOutcome::default();

    for dir in dirs {
        debug!(path = %dir.display(), "removing directory");
        match fs::remove_dir_all(&dir) {
            Ok(()) => outcome.dirs += 1,
            Err(err) => reporter.warning(&format!("could not remove {}: {err}", dir.display())),
        }
    }
    for file in files {
        debug!(path = %file.display(), "removing file");
        match fs::remove_file(&file) {
            Ok(()) => outcome.files += 1,
            Err(err) => reporter.warning(&format!("could not remove {}: {err}", file.display())),
        }
    }

    info!(dirs = outcome.dirs, files = outcome.files, "cleaning complete");
    Ok(outcome)
}
