//! Deterministic, pure logic shared by the environment and execution layer.
//!
//! Core modules must be free of I/O side effects. Anything that needs to touch
//! the filesystem or the host PATH receives it through the [`resolve::HostProbe`]
//! seam so decisions stay reproducible in tests.

pub mod layout;
pub mod quote;
pub mod resolve;
pub mod tool;
pub mod types;
