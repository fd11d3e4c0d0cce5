//! Shared data model for environment resolution and command execution.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::layout::VenvLayout;

/// An isolated runtime environment whose marker file has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnvironment {
    layout: VenvLayout,
}

impl VirtualEnvironment {
    /// Wrap a layout whose marker file the caller has already confirmed.
    pub fn from_verified_layout(layout: VenvLayout) -> Self {
        Self { layout }
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    pub fn bin_dir(&self) -> &Path {
        &self.layout.bin_dir
    }

    /// Expected interpreter path; may not exist on a damaged environment.
    pub fn interpreter(&self) -> &Path {
        &self.layout.interpreter
    }

    pub fn layout(&self) -> &VenvLayout {
        &self.layout
    }

    pub fn activation_hint(&self) -> String {
        self.layout.activation_hint()
    }
}

/// Something invocable for a named tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutableReference {
    /// Absolute path to a runnable binary.
    DirectPath { path: PathBuf },
    /// Run `module` through `interpreter -m`.
    ModuleInvocation {
        interpreter: PathBuf,
        module: String,
    },
}

impl ExecutableReference {
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        ExecutableReference::DirectPath { path: path.into() }
    }

    pub fn module(interpreter: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        ExecutableReference::ModuleInvocation {
            interpreter: interpreter.into(),
            module: module.into(),
        }
    }

    /// The program handed to the OS launcher.
    pub fn program(&self) -> &Path {
        match self {
            ExecutableReference::DirectPath { path } => path,
            ExecutableReference::ModuleInvocation { interpreter, .. } => interpreter,
        }
    }

    /// Full argument vector (program first) with `args` appended.
    pub fn argv<I, S>(&self, args: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv = vec![self.program().as_os_str().to_os_string()];
        if let ExecutableReference::ModuleInvocation { module, .. } = self {
            argv.push("-m".into());
            argv.push(module.into());
        }
        argv.extend(args.into_iter().map(Into::into));
        argv
    }
}

impl fmt::Display for ExecutableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutableReference::DirectPath { path } => write!(f, "{}", path.display()),
            ExecutableReference::ModuleInvocation {
                interpreter,
                module,
            } => write!(f, "{} -m {}", interpreter.display(), module),
        }
    }
}

/// Outcome of a process that ran to completion.
///
/// All three fields are always populated; a process that never started is an
/// error, not a defaulted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}
