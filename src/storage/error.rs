// ABOUTME: Error types for storage backend operations.
// ABOUTME: I/O failures keep their path and are classified by the underlying io kind.

use std::io;
use std::path::PathBuf;

use crate::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage configuration: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn container_not_found(name: impl ToString) -> Self {
        StorageError::NotFound {
            kind: "container",
            name: name.to_string(),
        }
    }

    pub fn container_exists(name: impl ToString) -> Self {
        StorageError::AlreadyExists {
            kind: "container",
            name: name.to_string(),
        }
    }

    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Config(_) => ErrorKind::Config,
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::AlreadyExists { .. } => ErrorKind::Conflict,
            StorageError::Io { source, .. } => ErrorKind::from_io(source),
            StorageError::Command { .. } | StorageError::Task(_) => ErrorKind::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}
