// ABOUTME: Error types for the datastore contract.
// ABOUTME: Locked is the one transient kind; callers retry it through db::retry.

use std::io;
use std::path::PathBuf;

use crate::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("datastore is locked")]
    Locked,

    #[error("no such {kind}: {name}")]
    NoRows { kind: &'static str, name: String },

    #[error("{kind} already defined: {name}")]
    AlreadyDefined { kind: &'static str, name: String },

    #[error("datastore I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("datastore is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn container_not_found(name: impl ToString) -> Self {
        DbError::NoRows {
            kind: "container",
            name: name.to_string(),
        }
    }

    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Locked => ErrorKind::TransientLock,
            DbError::NoRows { .. } => ErrorKind::NotFound,
            DbError::AlreadyDefined { .. } => ErrorKind::Conflict,
            DbError::Io { source, .. } => ErrorKind::from_io(source),
            DbError::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientLock
    }
}
