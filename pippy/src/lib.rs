//! Python project manager: isolated environments, tool installation, and
//! command execution for one project directory.
//!
//! The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (environment layout, executable
//!   resolution order, tool descriptors, argument quoting). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, host PATH, child
//!   processes, the config document). Isolated behind traits for tests.
//!
//! Orchestration modules ([`setup`], [`script`], [`clean`], [`dist`],
//! [`settings`], [`info`], [`shell`]) compose the two to implement CLI commands. Every
//! failure is a [`error::PippyError`] carrying the exit code the binary
//! terminates with.

pub mod clean;
pub mod core;
pub mod dist;
pub mod error;
pub mod exit_codes;
pub mod info;
pub mod io;
pub mod logging;
pub mod script;
pub mod session;
pub mod settings;
pub mod setup;
pub mod shell;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
