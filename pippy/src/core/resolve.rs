//! Executable resolution: turning a tool name into something invocable.
//!
//! The order is fixed. Direct binaries beat module invocation because they
//! leave no doubt about which interpreter runs them:
//!
//! 1. `<env>/<bin>/<tool>[.exe]` → [`ExecutableReference::DirectPath`]
//! 2. environment interpreter `-m <tool>` → [`ExecutableReference::ModuleInvocation`]
//! 3. host PATH lookup → [`ExecutableReference::DirectPath`]
//! 4. host interpreter `-m <tool>` (may be an unrelated interpreter)

use std::path::{Path, PathBuf};

use super::types::{ExecutableReference, VirtualEnvironment};

/// Read-only view of the host needed to resolve executables.
pub trait HostProbe {
    fn is_file(&self, path: &Path) -> bool;
    /// Search the executable search path for `tool`.
    fn search_path(&self, tool: &str) -> Option<PathBuf>;
    /// Interpreter used when no environment interpreter is available.
    fn host_interpreter(&self) -> PathBuf;
}

/// Which step of the resolution order produced the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    EnvironmentBinary,
    EnvironmentModule,
    SearchPath,
    HostInterpreterFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub reference: ExecutableReference,
    pub source: ResolutionSource,
}

impl Resolution {
    /// True when the last-resort fallback was used and callers should warn.
    pub fn is_fallback(&self) -> bool {
        self.source == ResolutionSource::HostInterpreterFallback
    }
}

/// Resolve `tool` against an optional environment and the host.
///
/// An environment without a usable interpreter falls through to the PATH
/// lookup rather than producing a module invocation that cannot run.
pub fn resolve_executable<H: HostProbe + ?Sized>(
    tool: &str,
    env: Option<&VirtualEnvironment>,
    host: &H,
) -> Resolution {
    if let Some(env) = env {
        if let Some(path) = env
            .layout()
            .executable_candidates(tool)
            .into_iter()
            .find(|candidate| host.is_file(candidate))
        {
            return Resolution {
                reference: ExecutableReference::direct(path),
                source: ResolutionSource::EnvironmentBinary,
            };
        }
        if host.is_file(env.interpreter()) {
            return Resolution {
                reference: ExecutableReference::module(env.interpreter(), tool),
                source: ResolutionSource::EnvironmentModule,
            };
        }
    }

    if let Some(path) = host.search_path(tool) {
        return Resolution {
            reference: ExecutableReference::direct(path),
            source: ResolutionSource::SearchPath,
        };
    }

    Resolution {
        reference: ExecutableReference::module(host.host_interpreter(), tool),
        source: ResolutionSource::HostInterpreterFallback,
    }
}

/// Interpreter for running scripts: the environment's when usable, else the host's.
pub fn select_interpreter<H: HostProbe + ?Sized>(
    env: Option<&VirtualEnvironment>,
    host: &H,
) -> (PathBuf, bool) {
    match env {
        Some(env) if host.is_file(env.interpreter()) => (env.interpreter().to_path_buf(), true),
        _ => (host.host_interpreter(), false),
    }
}
