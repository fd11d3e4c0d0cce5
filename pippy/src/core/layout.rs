//! Platform-dependent layout of an isolated runtime environment.

use std::path::{Path, PathBuf};

/// Fixed name of the environment directory under a project root.
pub const VENV_DIR_NAME: &str = ".venv";
/// Marker written by the environment tooling; its presence proves the directory is genuine.
pub const VENV_MARKER: &str = "pyvenv.cfg";

/// Host platform family, as far as environment layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Name of the directory holding scripts and binaries inside an environment.
    pub fn bin_dir_name(self) -> &'static str {
        match self {
            Platform::Windows => "Scripts",
            Platform::Unix => "bin",
        }
    }

    /// Suffix appended to executable names (empty on Unix).
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Unix => "",
        }
    }

    /// Candidate file names for `tool` inside the bin directory, most specific first.
    pub fn executable_candidates(self, tool: &str) -> Vec<String> {
        match self {
            Platform::Windows => vec![format!("{tool}.exe"), tool.to_string()],
            Platform::Unix => vec![tool.to_string()],
        }
    }
}

/// Derived paths of an environment rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvLayout {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
    pub interpreter: PathBuf,
    pub marker: PathBuf,
    pub platform: Platform,
}

impl VenvLayout {
    pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
        let root = root.into();
        let bin_dir = root.join(platform.bin_dir_name());
        let interpreter = bin_dir.join(format!("python{}", platform.exe_suffix()));
        Self {
            marker: root.join(VENV_MARKER),
            root,
            bin_dir,
            interpreter,
            platform,
        }
    }

    /// Layout of the fixed-name environment directory under a project root.
    pub fn for_project(project_root: &Path, platform: Platform) -> Self {
        Self::new(project_root.join(VENV_DIR_NAME), platform)
    }

    /// Candidate paths for a direct executable named `tool`.
    pub fn executable_candidates(&self, tool: &str) -> Vec<PathBuf> {
        self.platform
            .executable_candidates(tool)
            .into_iter()
            .map(|name| self.bin_dir.join(name))
            .collect()
    }

    /// Shell command a user runs to activate this environment manually.
    pub fn activation_hint(&self) -> String {
        match self.platform {
            Platform::Windows => format!("{}\\activate", self.bin_dir.display()),
            Platform::Unix => format!("source {}/activate", self.bin_dir.display()),
        }
    }
}
