//! Guaranteeing that a named tool is present, installing it when absent.

use tracing::{info, instrument, warn};

use crate::core::resolve::{HostProbe, resolve_executable};
use crate::core::tool::{Capability, ToolSpec, module_check_args};
use crate::core::types::ExecutableReference;
use crate::error::PippyError;
use crate::io::interpreter::Toolchain;
use crate::io::process::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Verification passed; nothing was installed.
    AlreadyPresent,
    Installed,
}

/// Check whether `spec` is satisfied in the toolchain's environment.
///
/// Executable checks are pure resolution; import checks run a short script through
/// the runner and read its exit code.
pub fn verify<R, H>(toolchain: &Toolchain<'_, R, H>, spec: &ToolSpec) -> Result<bool, PippyError>
where
    R: CommandRunner + ?Sized,
    H: HostProbe + ?Sized,
{
    match &spec.capability {
        Capability::Executable => {
            let resolution =
                resolve_executable(&spec.name, toolchain.environment(), toolchain.host());
            Ok(match resolution.reference {
                ExecutableReference::DirectPath { path } => toolchain.host().is_file(&path),
                ExecutableReference::ModuleInvocation { .. } => false,
            })
        }
        Capability::ModuleImport { module } => {
            let request = toolchain
                .python(module_check_args(module))
                .with_capture()
                .without_check();
            Ok(toolchain.run(&request)?.success())
        }
    }
}

/// Make sure `spec` is present, installing its package when verification fails.
///
/// No install subprocess is launched when the tool already verifies.
#[instrument(skip_all, fields(tool = %spec.name))]
pub fn ensure<R, H>(toolchain: &Toolchain<'_, R, H>, spec: &ToolSpec) -> Result<EnsureOutcome, PippyError>
where
    R: CommandRunner + ?Sized,
    H: HostProbe + ?Sized,
{
    if verify(toolchain, spec)? {
        info!(tool = %spec.name, "tool already installed");
        return Ok(EnsureOutcome::AlreadyPresent);
    }

    info!(tool = %spec.name, package = %spec.package, "tool not found or inaccessible, installing");
    match toolchain.run(&toolchain.pip(["install", spec.package.as_str()])) {
        Ok(_) => {}
        Err(PippyError::CommandFailed { code, stderr, .. }) => {
            return Err(PippyError::ToolInstallFailed {
                tool: spec.name.clone(),
                code: Some(code),
                stderr,
            });
        }
        Err(err) => return Err(err),
    }

    if !verify(toolchain, spec)? {
        warn!(tool = %spec.name, "installed package but the tool still does not verify");
    }
    info!(tool = %spec.name, "successfully installed");
    Ok(EnsureOutcome::Installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool::MODULE_CHECK;
    use crate::io::project::ProjectContext;
    use crate::test_support::{FakeHost, RecordingReporter, ScriptedRunner, make_venv};

    fn project() -> (tempfile::TempDir, ProjectContext) {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = ProjectContext::resolve(Some(temp.path())).expect("resolve");
        (temp, ctx)
    }

    #[test]
    fn present_executable_never_installs() {
        let (_temp, ctx) = project();
        let env = make_venv(ctx.root());
        crate::test_support::touch(&env.layout().executable_candidates("twine")[0]);
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env));

        let outcome = ensure(&toolchain, &ToolSpec::twine()).expect("ensure");
        assert_eq!(outcome, EnsureOutcome::AlreadyPresent);
        assert!(runner.requests().is_empty());
    }

    #[test]
    fn missing_executable_installs_once_then_verifies() {
        let (_temp, ctx) = project();
        let env = make_venv(ctx.root());
        let stub = env.layout().executable_candidates("pipreqs")[0].clone();
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter).respond_creating(stub.clone());
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env.clone()));

        let first = ensure(&toolchain, &ToolSpec::pipreqs()).expect("first ensure");
        assert_eq!(first, EnsureOutcome::Installed);
        assert!(stub.is_file());

        let second = ensure(&toolchain, &ToolSpec::pipreqs()).expect("second ensure");
        assert_eq!(second, EnsureOutcome::AlreadyPresent);
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "{} -m pip install pipreqs",
                env.interpreter().display()
            )]
        );
    }

    #[test]
    fn importable_module_check_skips_install() {
        let (_temp, ctx) = project();
        let env = make_venv(ctx.root());
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter).respond(0, "", "");
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env.clone()));

        let outcome = ensure(&toolchain, &ToolSpec::build()).expect("ensure");
        assert_eq!(outcome, EnsureOutcome::AlreadyPresent);

        let requests = runner.requests();
        assert_eq!(requests.len(), 1);
        let argv = requests[0].argv().expect("argv");
        assert_eq!(argv[0], env.interpreter().as_os_str());
        assert_eq!(argv[1], "-c");
        assert_eq!(argv[2], MODULE_CHECK);
        assert_eq!(argv[3], "build");
        assert!(!requests[0].check);
    }

    #[test]
    fn failed_import_check_triggers_install() {
        let (_temp, ctx) = project();
        let env = make_venv(ctx.root());
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter)
            .respond(1, "", "")
            .respond(0, "Successfully installed build", "")
            .respond(0, "", "");
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env));

        let outcome = ensure(&toolchain, &ToolSpec::build()).expect("ensure");
        assert_eq!(outcome, EnsureOutcome::Installed);
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("-m pip install build"));
    }

    #[test]
    fn installer_failure_is_tool_install_failed() {
        let (_temp, ctx) = project();
        let env = make_venv(ctx.root());
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter).respond(
            1,
            "",
            "ERROR: No matching distribution found for twine",
        );
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env));

        let err = ensure(&toolchain, &ToolSpec::twine()).unwrap_err();
        match &err {
            PippyError::ToolInstallFailed { tool, code, stderr } => {
                assert_eq!(tool, "twine");
                assert_eq!(*code, Some(1));
                assert!(stderr.contains("No matching distribution"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), crate::exit_codes::FAILURE);
        assert_eq!(reporter.stderr_reports().len(), 1);
    }

    #[test]
    fn missing_interpreter_during_import_check_is_not_found() {
        let (_temp, ctx) = project();
        let env = make_venv(ctx.root());
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter)
            .respond_not_found(&env.interpreter().display().to_string());
        let host = FakeHost::new();
        let toolchain = Toolchain::new(&runner, &host, &ctx, Some(env));

        let err = ensure(&toolchain, &ToolSpec::build()).unwrap_err();
        assert!(matches!(err, PippyError::ExecutableNotFound { .. }));
        assert_eq!(err.exit_code(), crate::exit_codes::NOT_FOUND);
        assert_eq!(runner.requests().len(), 1);
    }

    #[test]
    fn path_binary_counts_as_present_without_environment() {
        let (temp, ctx) = project();
        let on_path = temp.path().join("bin").join("pipreqs");
        crate::test_support::touch(&on_path);
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new().with_path_entry("pipreqs", on_path);
        let toolchain = Toolchain::new(&runner, &host, &ctx, None);

        assert!(verify(&toolchain, &ToolSpec::pipreqs()).expect("verify"));
        assert!(runner.requests().is_empty());
    }
}
