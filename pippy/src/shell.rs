//! Orchestration for `pippy shell`: an interactive shell with the project's
//! environment activated.

use std::ffi::OsString;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::core::layout::Platform;
use crate::core::resolve::HostProbe;
use crate::error::PippyError;
use crate::io::process::{RunRequest, ShellCommand};
use crate::session::Session;

/// Sources the activation script, then replaces itself with the user's shell.
const ACTIVATE_AND_EXEC: ShellCommand =
    ShellCommand::new(". \"$PIPPY_ACTIVATE\" && exec \"$PIPPY_SHELL\" -i");

/// Shell to hand the terminal to: the user's login shell, then bash, then sh.
/// On Windows, `COMSPEC` then `cmd.exe`.
pub fn choose_shell(
    configured: Option<OsString>,
    host: &dyn HostProbe,
    platform: Platform,
) -> OsString {
    if let Some(shell) = configured.filter(|shell| !shell.is_empty()) {
        return shell;
    }
    match platform {
        Platform::Windows => OsString::from("cmd.exe"),
        Platform::Unix => host
            .search_path("bash")
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("sh")),
    }
}

/// Build the request that starts an activated interactive shell.
pub fn shell_request(session: &Session<'_>, configured: Option<OsString>) -> Result<RunRequest> {
    let env = session.environment(false)?;
    let platform = env.layout().platform;
    let shell = choose_shell(configured, session.host(), platform);
    let root = session.context().root();

    let request = match platform {
        Platform::Unix => {
            let activate = env.bin_dir().join("activate");
            if !activate.is_file() {
                bail!("activation script not found: {}", activate.display());
            }
            RunRequest::shell(ACTIVATE_AND_EXEC)
                .with_env("PIPPY_ACTIVATE", utf8(&activate)?)
                .with_env("PIPPY_SHELL", utf8(Path::new(&shell))?)
        }
        Platform::Windows => {
            let activate = env.bin_dir().join("activate.bat");
            if !activate.is_file() {
                bail!("activation script not found: {}", activate.display());
            }
            RunRequest::new([shell, OsString::from("/K"), activate.into_os_string()])
        }
    };
    Ok(request.with_cwd(root).interactive())
}

/// Run an activated shell in the project root until the user leaves it.
///
/// Returns the shell's exit code.
#[instrument(skip_all)]
pub fn spawn_shell(session: &Session<'_>) -> Result<i32> {
    let configured = match Platform::current() {
        Platform::Windows => std::env::var_os("COMSPEC"),
        Platform::Unix => std::env::var_os("SHELL"),
    };
    let request = shell_request(session, configured)?;
    info!(command = %request.describe()?, "starting activated shell; exit it to return");
    let result = session
        .toolchain(None)
        .run(&request)
        .context("run interactive shell")?;
    Ok(result.code)
}

fn utf8(path: &Path) -> Result<String, PippyError> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        PippyError::InvalidArgument(format!("path is not valid UTF-8: {}", path.display()))
    })
}
