// ABOUTME: Errors raised by the operation registry.
// ABOUTME: Body failures are not errors here; they become the operation's Failure status.

use crate::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("operation {0} not found")]
    NotFound(String),

    #[error("operation {0} was already started")]
    AlreadyStarted(String),

    #[error("operation {0} has already finished")]
    AlreadyFinished(String),

    #[error("operation {0} cannot be cancelled")]
    NotCancellable(String),

    #[error("operation id {0} is already registered")]
    IdCollision(String),

    #[error("operation {0} has no websocket")]
    NoWebsocket(String),

    #[error("invalid websocket secret")]
    BadSecret,
}

impl OperationError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::NotFound(_) => ErrorKind::NotFound,
            OperationError::AlreadyStarted(_) | OperationError::AlreadyFinished(_) => {
                ErrorKind::Conflict
            }
            OperationError::NotCancellable(_) => ErrorKind::NotSupported,
            OperationError::IdCollision(_) => ErrorKind::Internal,
            OperationError::NoWebsocket(_) => ErrorKind::BadRequest,
            OperationError::BadSecret => ErrorKind::Permission,
        }
    }
}
