//! Typed failures raised by the environment and execution layer.
//!
//! Every variant maps to a process exit code so the binary can terminate
//! deterministically, while library callers can match on the variant instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum PippyError {
    /// No isolated environment exists and creation was not requested.
    #[error("no virtual environment found in {project} (run `pippy init` to create one)")]
    EnvironmentNotFound { project: PathBuf },

    /// The OS launcher could not find the program.
    #[error("command not found: {program}")]
    ExecutableNotFound { program: String },

    /// Installing (or creating) a required tool failed.
    #[error("failed to install {tool}{}", describe_code(*code))]
    ToolInstallFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A command run with `check` enabled exited non-zero.
    #[error("command failed with exit code {code}: {command}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The process could not be started for a reason other than a missing program.
    #[error("could not start {command}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("directory not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PippyError {
    /// Map the failure to the process exit code the CLI terminates with.
    pub fn exit_code(&self) -> i32 {
        match self {
            PippyError::ExecutableNotFound { .. } => exit_codes::NOT_FOUND,
            _ => exit_codes::FAILURE,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        PippyError::Io {
            context: context.into(),
            source,
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit code {code})"),
        None => String::new(),
    }
}

/// Exit code for an error chain produced by a command.
///
/// The first [`PippyError`] in the chain decides; anything else is a generic failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PippyError>())
        .map_or(exit_codes::FAILURE, PippyError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn executable_not_found_maps_to_127() {
        let err = PippyError::ExecutableNotFound {
            program: "nope".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::NOT_FOUND);
    }

    #[test]
    fn command_failed_maps_to_generic_failure() {
        let err = PippyError::CommandFailed {
            command: "false".to_string(),
            code: 7,
            stderr: "boom".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn exit_code_found_through_context_layers() {
        let result: Result<(), PippyError> = Err(PippyError::ExecutableNotFound {
            program: "twine".to_string(),
        });
        let err = result.context("publish").unwrap_err();
        assert_eq!(exit_code_for(&err), exit_codes::NOT_FOUND);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&plain), exit_codes::FAILURE);
    }

    #[test]
    fn install_failure_message_includes_code() {
        let err = PippyError::ToolInstallFailed {
            tool: "pipreqs".to_string(),
            code: Some(2),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "failed to install pipreqs (exit code 2)");
    }
}
