//! Side-effecting adapters: filesystem, host PATH, child processes, config file.

pub mod config;
pub mod host;
pub mod installer;
pub mod interpreter;
pub mod process;
pub mod project;
pub mod prompt;
pub mod report;
pub mod scan;
pub mod venv;
