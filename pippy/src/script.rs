//! Orchestration for `pippy run` and `pippy start`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::core::layout::VENV_DIR_NAME;
use crate::core::resolve::HostProbe;
use crate::io::process::CommandRunner;
use crate::io::project::ProjectContext;
use crate::io::venv::{ACTIVE_ENV_VAR, active_environment};
use crate::session::Session;

static MAIN_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^if\s+__name__\s*==\s*(?:"__main__"|'__main__')\s*:"#).unwrap()
});

/// Whether the file at `path` has a top-level `if __name__ == "__main__":` block.
pub fn has_main_block(path: &Path) -> bool {
    match fs::read(path) {
        Ok(bytes) => MAIN_BLOCK_RE.is_match(&String::from_utf8_lossy(&bytes)),
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read file to check for main block");
            false
        }
    }
}

/// Script to execute and the project it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTarget {
    pub project: ProjectContext,
    pub script: PathBuf,
}

/// Interpret `target`: a `.py` file runs directly inside its parent directory;
/// a directory runs its configured `main` script.
pub fn resolve_target(target: &Path, runner: &dyn CommandRunner) -> Result<ScriptTarget> {
    let absolute = target
        .canonicalize()
        .with_context(|| format!("target not found: {}", target.display()))?;

    if absolute.is_file() && absolute.extension().is_some_and(|ext| ext == "py") {
        let parent = absolute
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent directory", absolute.display()))?;
        let project = ProjectContext::resolve(Some(parent))?;
        info!(script = %absolute.display(), "running specific file");
        return Ok(ScriptTarget {
            project,
            script: absolute,
        });
    }

    if !absolute.is_dir() {
        bail!(
            "target '{}' is not a Python file or project directory",
            target.display()
        );
    }

    let project = ProjectContext::resolve(Some(&absolute))?;
    let config = crate::io::config::read_config(&project, runner.reporter());
    let Some(main) = config.main() else {
        bail!(
            "no 'main' script configured in {} (run `pippy install` or `pippy config set main <file>`)",
            project.config_path().display()
        );
    };
    let script = project.root().join(main);
    if !script.is_file() {
        bail!("configured main script not found: {}", script.display());
    }
    info!(script = %project.relative(&script).display(), "running configured main script");
    Ok(ScriptTarget { project, script })
}

/// Run `target` with `args` and return the script's own exit code.
///
/// Without a project environment the host interpreter is used after a warning.
pub fn run_target(
    runner: &dyn CommandRunner,
    host: &dyn HostProbe,
    target: &Path,
    args: &[OsString],
) -> Result<i32> {
    let ScriptTarget { project, script } = resolve_target(target, runner)?;
    let session = Session::new(project, runner, host);
    let env = session.find_environment();
    if env.is_none() {
        let name = script
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let message = match active_environment() {
            Some(active) => format!(
                "running {name} without a project environment ({VENV_DIR_NAME}); \
                 {ACTIVE_ENV_VAR} is {}, using the host interpreter",
                active.display()
            ),
            None => format!(
                "no virtual environment found in {}, running with the host interpreter",
                session.context().root().display()
            ),
        };
        session.reporter().warning(&message);
    }

    let toolchain = session.toolchain(env);
    let mut argv = vec![script.into_os_string()];
    argv.extend(args.iter().cloned());
    let result = toolchain
        .run(&toolchain.python(argv).without_check())
        .context("failed to execute the script")?;
    if result.success() {
        debug!("script finished");
    } else {
        warn!(code = result.code, "script exited with non-zero status");
    }
    Ok(result.code)
}

/// `pippy run <dir>` for the given (or current) directory.
pub fn start(
    runner: &dyn CommandRunner,
    host: &dyn HostProbe,
    dir: Option<&Path>,
    args: &[OsString],
) -> Result<i32> {
    debug!("start is equivalent to run on the project directory");
    run_target(runner, host, dir.unwrap_or_else(|| Path::new(".")), args)
}
