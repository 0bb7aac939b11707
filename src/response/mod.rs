// ABOUTME: Response layer turning handler results into sync, async, file or error replies.
// ABOUTME: Async responses create and start the operation at render time.

mod error;
mod file;

pub use error::status_for;
pub use file::{FileResponse, ResponseFile};

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::Error;
use crate::operation::{
    OperationBody, OperationRegistry, OperationWebsocket, Resources, Task, expand_resources,
};
use crate::status::StatusCode as ApiStatus;

/// Rendering options, fixed at daemon construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseConfig {
    /// Also log every JSON body at debug level.
    pub debug: bool,
}

/// Everything a response needs in order to render.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub operations: Arc<OperationRegistry>,
    pub config: ResponseConfig,
}

/// Background work to be tracked as an operation.
#[derive(Debug)]
pub struct AsyncResponse {
    body: OperationBody,
    resources: Resources,
    metadata: Value,
}

impl AsyncResponse {
    pub fn new(body: OperationBody) -> Self {
        Self {
            body,
            resources: Resources::new(),
            metadata: Value::Null,
        }
    }

    /// Add affected resources of one type, e.g. `("containers", ["web"])`.
    pub fn resources<I, S>(mut self, kind: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.resources
            .entry(kind.to_string())
            .or_default()
            .extend(names.into_iter().map(|n| n.to_string()));
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The reply to one API request.
#[derive(Debug)]
pub enum Response {
    Sync { success: bool, metadata: Value },
    Async(AsyncResponse),
    File(FileResponse),
    Error { code: StatusCode, message: String },
}

impl Response {
    pub fn sync(success: bool, metadata: impl Serialize) -> Response {
        match serde_json::to_value(metadata) {
            Ok(metadata) => Response::Sync { success, metadata },
            Err(e) => Response::smart_error(Some(&Error::internal(e.to_string()))),
        }
    }

    pub fn empty_sync() -> Response {
        Response::Sync {
            success: true,
            metadata: json!({}),
        }
    }

    pub fn task(task: impl Task + 'static) -> AsyncResponse {
        AsyncResponse::new(OperationBody::task(task))
    }

    pub fn websocket(ws: impl OperationWebsocket + 'static) -> AsyncResponse {
        AsyncResponse::new(OperationBody::websocket(ws))
    }

    pub fn file(files: Vec<ResponseFile>, headers: Vec<(String, String)>, remove_after_serve: bool) -> Response {
        Response::File(FileResponse {
            files,
            headers,
            remove_after_serve,
        })
    }

    pub async fn render(self, ctx: &RenderContext) -> axum::response::Response {
        match self {
            Response::Sync { success, metadata } => {
                let status = if success {
                    ApiStatus::Success
                } else {
                    ApiStatus::Failure
                };
                let body = json!({
                    "type": "sync",
                    "status": status.as_str(),
                    "status_code": status.code(),
                    "metadata": metadata,
                });
                write_json(ctx, StatusCode::OK, &body, None)
            }
            Response::Async(pending) => match start_operation(ctx, pending) {
                Ok(rendered) => rendered,
                Err(err) => Box::pin(Response::from(err).render(ctx)).await,
            },
            Response::File(file) => match file.render().await {
                Ok(rendered) => rendered,
                Err(err) => Box::pin(Response::from(err).render(ctx)).await,
            },
            Response::Error { code, message } => {
                let body = json!({
                    "type": "error",
                    "error": message,
                    "error_code": code.as_u16(),
                });
                write_json(ctx, code, &body, None)
            }
        }
    }
}

impl From<AsyncResponse> for Response {
    fn from(pending: AsyncResponse) -> Self {
        Response::Async(pending)
    }
}

fn start_operation(
    ctx: &RenderContext,
    pending: AsyncResponse,
) -> Result<axum::response::Response, Error> {
    let op = ctx
        .operations
        .create(pending.metadata, pending.resources, pending.body)?;
    op.start()?;

    let url = op.url();
    let body = json!({
        "type": "async",
        "status": ApiStatus::Ok.as_str(),
        "status_code": ApiStatus::Ok.code(),
        "operation": url,
        "resources": expand_resources(op.resources()),
        "metadata": op.metadata(),
    });
    Ok(write_json(ctx, StatusCode::ACCEPTED, &body, Some(&url)))
}

/// Serialize an envelope; in debug mode the body is also captured to the log.
fn write_json(
    ctx: &RenderContext,
    status: StatusCode,
    body: &Value,
    location: Option<&str>,
) -> axum::response::Response {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            return axum::response::Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap_or_default();
        }
    };

    if ctx.config.debug {
        let captured = bytes.clone();
        tracing::debug!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(&captured),
            "response"
        );
    }

    let mut builder = axum::response::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json");
    if let Some(location) = location {
        builder = builder.header(LOCATION, location);
    }
    builder.body(Body::from(bytes)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build response");
        let mut fallback = axum::response::Response::default();
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
