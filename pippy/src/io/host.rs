//! Host probing backed by the real filesystem and executable search path.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::resolve::HostProbe;

/// Explicit host interpreter override.
pub const PYTHON_OVERRIDE_ENV: &str = "PIPPY_PYTHON";

#[cfg(windows)]
const PYTHON_CANDIDATES: &[&str] = &["python"];

#[cfg(not(windows))]
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// Host lookup for the machine pippy runs on.
///
/// The host interpreter is discovered once at construction so every
/// resolution within one invocation sees the same answer.
#[derive(Debug, Clone)]
pub struct SystemHost {
    interpreter: PathBuf,
}

impl SystemHost {
    pub fn detect() -> Self {
        let interpreter = discover_interpreter(env::var_os(PYTHON_OVERRIDE_ENV).map(PathBuf::from));
        debug!(interpreter = %interpreter.display(), "host interpreter");
        Self { interpreter }
    }
}

impl HostProbe for SystemHost {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn search_path(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }

    fn host_interpreter(&self) -> PathBuf {
        self.interpreter.clone()
    }
}

/// Pick the host interpreter: override, then PATH candidates, then the bare name.
///
/// An unresolved bare name fails at launch as "command not found".
fn discover_interpreter(override_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    PYTHON_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .unwrap_or_else(|| PathBuf::from(PYTHON_CANDIDATES[0]))
}
