// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Wraps process spawn failures and non-zero exits of the runtime tools.

use snafu::Snafu;

use crate::error::ErrorKind;

/// Errors reported by a container runtime driver.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("failed to run `{command}`: {source}"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("`{command}` exited with {code}: {stderr}"))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[snafu(display("container {name} is not known to the runtime"))]
    NotFound { name: String },

    #[snafu(display("runtime reported unknown state `{state}` for {name}"))]
    UnknownState { name: String, state: String },
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Spawn { source, .. } => match ErrorKind::from_io(source) {
                ErrorKind::Permission => ErrorKind::Permission,
                _ => ErrorKind::Internal,
            },
            RuntimeError::NotFound { .. } => ErrorKind::NotFound,
            RuntimeError::CommandFailed { .. } | RuntimeError::UnknownState { .. } => {
                ErrorKind::Internal
            }
        }
    }
}
