//! Interpreter-aware command construction for one project.
//!
//! A [`Toolchain`] binds the runner, host lookup, project root, and optional
//! environment together so commands can be built without repeating the
//! interpreter selection rules.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

use crate::core::resolve::{HostProbe, Resolution, resolve_executable, select_interpreter};
use crate::core::types::{CommandResult, ExecutableReference, VirtualEnvironment};
use crate::error::PippyError;
use crate::io::process::{CommandRunner, RunRequest};
use crate::io::project::ProjectContext;

pub struct Toolchain<'a, R: ?Sized, H: ?Sized> {
    runner: &'a R,
    host: &'a H,
    ctx: &'a ProjectContext,
    env: Option<VirtualEnvironment>,
}

impl<'a, R, H> Toolchain<'a, R, H>
where
    R: CommandRunner + ?Sized,
    H: HostProbe + ?Sized,
{
    pub fn new(
        runner: &'a R,
        host: &'a H,
        ctx: &'a ProjectContext,
        env: Option<VirtualEnvironment>,
    ) -> Self {
        Self {
            runner,
            host,
            ctx,
            env,
        }
    }

    pub fn environment(&self) -> Option<&VirtualEnvironment> {
        self.env.as_ref()
    }

    pub fn host(&self) -> &H {
        self.host
    }

    /// Resolve `tool`, warning when only the host-interpreter fallback applies.
    pub fn resolution(&self, tool: &str) -> Resolution {
        let resolution = resolve_executable(tool, self.env.as_ref(), self.host);
        debug!(tool, source = ?resolution.source, reference = %resolution.reference, "resolved executable");
        if resolution.is_fallback() {
            self.runner.reporter().warning(&format!(
                "'{tool}' not found in the virtual environment or PATH, attempting '{}'",
                resolution.reference
            ));
        }
        resolution
    }

    pub fn resolve(&self, tool: &str) -> ExecutableReference {
        self.resolution(tool).reference
    }

    /// Interpreter for running Python code in this project.
    pub fn interpreter(&self) -> PathBuf {
        let (interpreter, from_env) = select_interpreter(self.env.as_ref(), self.host);
        if let (Some(env), false) = (&self.env, from_env) {
            self.runner.reporter().warning(&format!(
                "could not find a python executable in {}, using {}",
                env.root().display(),
                interpreter.display()
            ));
        }
        interpreter
    }

    /// Request running the interpreter with `args`, rooted at the project.
    pub fn python<I, S>(&self, args: I) -> RunRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv = vec![self.interpreter().into_os_string()];
        argv.extend(args.into_iter().map(Into::into));
        RunRequest::new(argv).with_cwd(self.ctx.root())
    }

    /// Request running the package installer (`python -m pip`) with `args`.
    pub fn pip<I, S>(&self, args: I) -> RunRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv: Vec<OsString> = vec!["-m".into(), "pip".into()];
        argv.extend(args.into_iter().map(Into::into));
        self.python(argv)
    }

    /// Request invoking a resolved executable with `args`.
    pub fn tool<I, S>(&self, reference: &ExecutableReference, args: I) -> RunRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        RunRequest::new(reference.argv(args)).with_cwd(self.ctx.root())
    }

    pub fn run(&self, request: &RunRequest) -> Result<CommandResult, PippyError> {
        self.runner.run(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHost, RecordingReporter, ScriptedRunner, make_venv};

    #[test]
    fn pip_request_prepends_environment_interpreter() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = ProjectContext::resolve(Some(temp.path())).expect("resolve");
        let env = make_venv(ctx.root());
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env.clone()));

        toolchain
            .run(&toolchain.pip(["install", "twine"]))
            .expect("run");

        assert_eq!(
            runner.command_lines(),
            vec![format!("{} -m pip install twine", env.interpreter().display())]
        );
        assert_eq!(
            runner.requests()[0].cwd.as_deref(),
            Some(ctx.root())
        );
        assert!(reporter.warnings().is_empty());
    }

    #[test]
    fn python_without_environment_uses_host_interpreter_silently() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = ProjectContext::resolve(Some(temp.path())).expect("resolve");
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new().with_interpreter("/usr/bin/python3");
        let toolchain = Toolchain::new(&runner, &host, &ctx, None);

        let request = toolchain.python(["app.py"]);
        assert_eq!(
            request.argv().map(<[OsString]>::to_vec),
            Some(vec![OsString::from("/usr/bin/python3"), "app.py".into()])
        );
        assert!(reporter.warnings().is_empty());
    }

    #[test]
    fn fallback_resolution_warns() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = ProjectContext::resolve(Some(temp.path())).expect("resolve");
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new().with_interpreter("/usr/bin/python3");
        let toolchain = Toolchain::new(&runner, &host, &ctx, None);

        let reference = toolchain.resolve("twine");
        assert_eq!(
            reference,
            ExecutableReference::module("/usr/bin/python3", "twine")
        );
        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'twine' not found"));
    }
}
