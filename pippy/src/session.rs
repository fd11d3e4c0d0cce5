//! Per-invocation wiring shared by every command.

use std::path::Path;

use crate::core::resolve::HostProbe;
use crate::core::types::VirtualEnvironment;
use crate::error::PippyError;
use crate::io::config::{ProjectConfig, read_config};
use crate::io::interpreter::Toolchain;
use crate::io::process::CommandRunner;
use crate::io::project::ProjectContext;
use crate::io::report::Reporter;
use crate::io::venv::{ensure_environment, find_environment};

/// Toolchain over the trait objects a [`Session`] holds.
pub type SessionToolchain<'a> = Toolchain<'a, dyn CommandRunner + 'a, dyn HostProbe + 'a>;

/// A resolved project plus the runner and host lookup used against it.
///
/// Built fresh for each command; nothing here is cached across invocations.
pub struct Session<'a> {
    ctx: ProjectContext,
    runner: &'a dyn CommandRunner,
    host: &'a dyn HostProbe,
}

impl<'a> Session<'a> {
    pub fn open(
        dir: Option<&Path>,
        runner: &'a dyn CommandRunner,
        host: &'a dyn HostProbe,
    ) -> Result<Self, PippyError> {
        Ok(Self::new(ProjectContext::resolve(dir)?, runner, host))
    }

    pub fn new(ctx: ProjectContext, runner: &'a dyn CommandRunner, host: &'a dyn HostProbe) -> Self {
        Self { ctx, runner, host }
    }

    pub fn context(&self) -> &ProjectContext {
        &self.ctx
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.runner.reporter()
    }

    pub fn host(&self) -> &dyn HostProbe {
        self.host
    }

    pub fn config(&self) -> ProjectConfig {
        read_config(&self.ctx, self.reporter())
    }

    pub fn find_environment(&self) -> Option<VirtualEnvironment> {
        find_environment(&self.ctx)
    }

    /// Existing environment, or a freshly created one when `create_if_missing`.
    pub fn environment(&self, create_if_missing: bool) -> Result<VirtualEnvironment, PippyError> {
        ensure_environment(&self.ctx, self.runner, self.host, create_if_missing)
    }

    pub fn toolchain(&self, env: Option<VirtualEnvironment>) -> SessionToolchain<'_> {
        Toolchain::new(self.runner, self.host, &self.ctx, env)
    }
}
