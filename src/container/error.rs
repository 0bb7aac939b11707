// ABOUTME: Errors raised by container lifecycle verbs themselves.
// ABOUTME: Storage, runtime and datastore failures pass through the crate Error unchanged.

use std::time::Duration;

use crate::error::ErrorKind;
use crate::types::ContainerNameError;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container {0} not found")]
    NotFound(String),

    #[error("container {0} already exists")]
    AlreadyExists(String),

    #[error("container {0} is already running")]
    AlreadyRunning(String),

    #[error("container {0} is not running")]
    NotRunning(String),

    #[error("container {0} is not frozen")]
    NotFrozen(String),

    #[error("container {0} must be stopped first")]
    NotStopped(String),

    #[error("container {name} did not shut down within {timeout:?}")]
    ShutdownTimeout { name: String, timeout: Duration },

    #[error("{0} is a snapshot")]
    IsSnapshot(String),

    #[error("invalid container name: {0}")]
    InvalidName(#[from] ContainerNameError),

    #[error("unknown state action: {0}")]
    InvalidAction(String),
}

impl ContainerError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::NotFound(_) => ErrorKind::NotFound,
            ContainerError::AlreadyExists(_)
            | ContainerError::NotRunning(_)
            | ContainerError::NotFrozen(_)
            | ContainerError::NotStopped(_) => ErrorKind::Conflict,
            ContainerError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            ContainerError::ShutdownTimeout { .. } => ErrorKind::Timeout,
            ContainerError::IsSnapshot(_)
            | ContainerError::InvalidName(_)
            | ContainerError::InvalidAction(_) => ErrorKind::BadRequest,
        }
    }
}
