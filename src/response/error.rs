// ABOUTME: Mapping from error kinds to HTTP status codes.
// ABOUTME: Exhaustive on purpose: a new ErrorKind must pick its status here.

use axum::http::StatusCode;

use super::Response;
use crate::error::{Error, ErrorKind};

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::AlreadyRunning => StatusCode::CONFLICT,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotSupported => StatusCode::BAD_REQUEST,
        ErrorKind::TransientLock => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::StorageFull => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Timeout => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl Response {
    /// Render an error by its kind; no error renders as an empty success.
    pub fn smart_error(err: Option<&Error>) -> Response {
        match err {
            None => Response::empty_sync(),
            Some(err) => Response::Error {
                code: status_for(err.kind()),
                message: err.to_string(),
            },
        }
    }

    pub fn bad_request(message: impl ToString) -> Response {
        Response::Error {
            code: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Response {
        Response::Error {
            code: StatusCode::NOT_FOUND,
            message: format!("{} not found", what),
        }
    }

    pub fn internal_error(message: impl ToString) -> Response {
        Response::Error {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }

    pub fn not_implemented() -> Response {
        Response::Error {
            code: StatusCode::NOT_IMPLEMENTED,
            message: "not implemented".to_string(),
        }
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Response::smart_error(Some(&err))
    }
}
