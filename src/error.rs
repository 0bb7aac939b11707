// ABOUTME: Application-wide error type and the tagged error-kind taxonomy.
// ABOUTME: Every error exposes kind() so the response layer can map it exhaustively.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::container::ContainerError;
use crate::db::DbError;
use crate::operation::OperationError;
use crate::runtime::RuntimeError;
use crate::storage::StorageError;

/// Error kind for programmatic handling.
///
/// Carried by every error value; adding a variant forces every match on it
/// (notably the HTTP status mapping) to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Absent resource, container, image or datastore row.
    NotFound,
    /// Permission denied by the host.
    Permission,
    /// Already exists, unique violation, or a state that forbids the request.
    Conflict,
    /// Invalid backend or daemon configuration.
    Config,
    /// No space left on the backing device.
    StorageFull,
    /// Start requested on a container that is not stopped.
    AlreadyRunning,
    /// Graceful shutdown deadline exceeded.
    Timeout,
    /// Cancel requested on an operation without a cancel hook.
    NotSupported,
    /// Datastore contention; always safe to retry.
    TransientLock,
    /// Malformed client request.
    BadRequest,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Classify a raw I/O error.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            io::ErrorKind::AlreadyExists => ErrorKind::Conflict,
            io::ErrorKind::StorageFull => ErrorKind::StorageFull,
            _ => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Storage(e) => e.kind(),
            Error::Runtime(e) => e.kind(),
            Error::Db(e) => e.kind(),
            Error::Container(e) => e.kind(),
            Error::Operation(e) => e.kind(),
            Error::BadRequest(_) | Error::Json(_) => ErrorKind::BadRequest,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ConfigNotFound(_) | Error::InvalidConfig(_) | Error::Yaml(_) => {
                ErrorKind::Config
            }
            Error::Io(e) => ErrorKind::from_io(e),
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
