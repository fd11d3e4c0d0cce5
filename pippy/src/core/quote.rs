//! Argument quoting for non-shell invocations.
//!
//! Arguments are passed to the OS launcher as a discrete list, but each one is
//! still run through POSIX quoting first: arguments that cannot be represented
//! (interior NUL bytes) are rejected before anything is spawned, and the quoted
//! form is what logs and failure messages show.

use std::ffi::OsString;

use crate::error::PippyError;

/// Quote a single argument, rejecting values no launcher can carry.
pub fn quote_arg(arg: &str) -> Result<String, PippyError> {
    shlex::try_quote(arg)
        .map(|quoted| quoted.into_owned())
        .map_err(|err| PippyError::InvalidArgument(format!("{arg:?}: {err}")))
}

/// Render `argv` as a single shell-safe command line.
pub fn render_command_line(argv: &[OsString]) -> Result<String, PippyError> {
    let quoted = argv
        .iter()
        .map(|arg| quote_arg(&arg.to_string_lossy()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(quoted.join(" "))
}
