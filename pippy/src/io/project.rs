//! Project directory resolution.

use std::env;
use std::path::{Path, PathBuf};

use crate::core::layout::{Platform, VenvLayout};
use crate::error::PippyError;

/// Config document name at the project root.
pub const CONFIG_FILE_NAME: &str = "pippy.json";
pub const REQ_FILE_NAME: &str = "requirements.txt";
pub const LOCK_FILE_NAME: &str = "requirements.lock";

/// Directories skipped by file discovery, cleaning, and requirement scans.
pub const EXCLUDE_DIRS: &[&str] = &[
    ".venv",
    "venv",
    "__pycache__",
    ".git",
    ".hg",
    "dist",
    "build",
    "docs/_build",
];

/// Absolute working root for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    root: PathBuf,
}

impl ProjectContext {
    /// Resolve `dir` (or the current directory) to an absolute, existing directory.
    pub fn resolve(dir: Option<&Path>) -> Result<Self, PippyError> {
        let candidate = match dir {
            Some(dir) => dir.to_path_buf(),
            None => env::current_dir().map_err(|e| PippyError::io("read current directory", e))?,
        };
        if !candidate.is_dir() {
            return Err(PippyError::ProjectNotFound(candidate));
        }
        let root = candidate
            .canonicalize()
            .map_err(|e| PippyError::io(format!("resolve {}", candidate.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.root.join(REQ_FILE_NAME)
    }

    pub fn venv_layout(&self) -> VenvLayout {
        VenvLayout::for_project(&self.root, Platform::current())
    }

    /// Path relative to the project root when it lies inside it.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_directory_to_absolute() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = ProjectContext::resolve(Some(temp.path())).expect("resolve");
        assert!(ctx.root().is_absolute());
        assert_eq!(ctx.config_path(), ctx.root().join("pippy.json"));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = ProjectContext::resolve(Some(&temp.path().join("nope"))).unwrap_err();
        assert!(matches!(err, PippyError::ProjectNotFound(_)));
    }

    #[test]
    fn file_is_not_a_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("app.py");
        std::fs::write(&file, "").expect("write");
        assert!(ProjectContext::resolve(Some(&file)).is_err());
    }
}
