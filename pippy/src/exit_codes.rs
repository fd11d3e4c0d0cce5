//! Stable exit codes for pippy CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Generic or fatal failure (tool install failure, checked command failure, bad project).
pub const FAILURE: i32 = 1;
/// The executable could not be found by the OS launcher.
pub const NOT_FOUND: i32 = 127;
