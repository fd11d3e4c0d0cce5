//! Locating and creating the project's isolated environment.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::core::layout::VenvLayout;
use crate::core::resolve::HostProbe;
use crate::core::types::VirtualEnvironment;
use crate::error::PippyError;
use crate::io::process::{CommandRunner, RunRequest};
use crate::io::project::ProjectContext;

/// Set by activation scripts to the root of the active environment.
pub const ACTIVE_ENV_VAR: &str = "VIRTUAL_ENV";

/// Return the project's environment if the fixed-name directory carries the marker.
///
/// A same-named directory without the marker is reported as absent.
pub fn find_environment(ctx: &ProjectContext) -> Option<VirtualEnvironment> {
    locate(ctx.venv_layout())
}

fn locate(layout: VenvLayout) -> Option<VirtualEnvironment> {
    if layout.root.is_dir() && layout.marker.is_file() {
        debug!(root = %layout.root.display(), "found virtual environment");
        return Some(VirtualEnvironment::from_verified_layout(layout));
    }
    debug!(root = %layout.root.display(), "no virtual environment");
    None
}

/// Create the environment with the host interpreter's `venv` module.
#[instrument(skip_all, fields(project = %ctx.root().display()))]
pub fn create_environment<R, H>(
    ctx: &ProjectContext,
    runner: &R,
    host: &H,
) -> Result<VirtualEnvironment, PippyError>
where
    R: CommandRunner + ?Sized,
    H: HostProbe + ?Sized,
{
    let layout = ctx.venv_layout();
    info!(root = %layout.root.display(), "creating virtual environment");
    let request = RunRequest::new([
        host.host_interpreter().into_os_string(),
        "-m".into(),
        "venv".into(),
        layout.root.clone().into_os_string(),
    ])
    .with_cwd(ctx.root())
    .with_capture()
    .without_check();

    let result = runner.run(&request)?;
    if !result.success() {
        if !result.stderr.is_empty() {
            runner
                .reporter()
                .command_stderr(&request.describe()?, &result.stderr);
        }
        return Err(PippyError::ToolInstallFailed {
            tool: "virtual environment".to_string(),
            code: Some(result.code),
            stderr: result.stderr,
        });
    }

    locate(layout).ok_or_else(|| PippyError::ToolInstallFailed {
        tool: "virtual environment".to_string(),
        code: None,
        stderr: "environment creation reported success but no pyvenv.cfg was written".to_string(),
    })
}

/// Find the environment, creating it when `create_if_missing` is set.
pub fn ensure_environment<R, H>(
    ctx: &ProjectContext,
    runner: &R,
    host: &H,
    create_if_missing: bool,
) -> Result<VirtualEnvironment, PippyError>
where
    R: CommandRunner + ?Sized,
    H: HostProbe + ?Sized,
{
    if let Some(env) = find_environment(ctx) {
        info!(root = %env.root().display(), "found existing virtual environment");
        return Ok(env);
    }
    if !create_if_missing {
        return Err(PippyError::EnvironmentNotFound {
            project: ctx.root().to_path_buf(),
        });
    }
    let env = create_environment(ctx, runner, host)?;
    info!("virtual environment created");
    Ok(env)
}

/// Root of an already-active environment, if pippy runs inside one.
pub fn active_environment() -> Option<PathBuf> {
    env::var_os(ACTIVE_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Parse the `key = value` lines of the environment's marker file.
pub fn read_marker(env: &VirtualEnvironment) -> Result<BTreeMap<String, String>, PippyError> {
    let path = &env.layout().marker;
    let contents = fs::read_to_string(path)
        .map_err(|e| PippyError::io(format!("read {}", path.display()), e))?;
    Ok(parse_marker(&contents))
}

fn parse_marker(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
