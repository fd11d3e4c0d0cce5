//! User-facing reporting handle.
//!
//! Diagnostics go through `tracing`. Output the user must see regardless of
//! the log filter (a failing subprocess's stderr, fallback warnings) goes
//! through a [`Reporter`] that is handed to each component explicitly.

use tracing::debug;

pub trait Reporter {
    /// Show the captured stderr of a failed command.
    fn command_stderr(&self, command: &str, stderr: &str);
    fn warning(&self, message: &str);
}

/// Reporter that writes to the process's stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn command_stderr(&self, command: &str, stderr: &str) {
        debug!(command, "emitting captured stderr");
        eprintln!("Error output:\n{stderr}");
    }

    fn warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }
}
