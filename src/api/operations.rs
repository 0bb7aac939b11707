// ABOUTME: Operation handlers: list, inspect, cancel, wait and websocket attach.
// ABOUTME: Waiting blocks only the requesting task, never the operation.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response as HttpResponse;
use serde::Deserialize;
use std::time::Duration;

use super::AppState;
use crate::daemon::Daemon;
use crate::error::Result;
use crate::operation::OperationError;
use crate::response::Response;

pub(super) async fn list(State(daemon): State<AppState>) -> HttpResponse {
    let grouped = daemon.operations().list();
    daemon.respond(Ok(Response::sync(true, grouped))).await
}

pub(super) async fn get(State(daemon): State<AppState>, Path(id): Path<String>) -> HttpResponse {
    let result = daemon
        .operations()
        .get(&id)
        .map(|op| Response::sync(true, op.view()))
        .map_err(Into::into);
    daemon.respond(result).await
}

pub(super) async fn cancel(State(daemon): State<AppState>, Path(id): Path<String>) -> HttpResponse {
    daemon.respond(cancel_operation(&daemon, &id).await).await
}

async fn cancel_operation(daemon: &Daemon, id: &str) -> Result<Response> {
    daemon.operations().cancel(id).await?;
    Ok(Response::empty_sync())
}

#[derive(Debug, Deserialize)]
pub(super) struct WaitQuery {
    /// Seconds; negative waits until the operation finishes.
    #[serde(default = "default_wait_timeout")]
    pub timeout: i64,
}

fn default_wait_timeout() -> i64 {
    -1
}

pub(super) async fn wait(
    State(daemon): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> HttpResponse {
    daemon.respond(wait_operation(&daemon, &id, query.timeout).await).await
}

async fn wait_operation(daemon: &Daemon, id: &str, timeout: i64) -> Result<Response> {
    let op = daemon.operations().get(id)?;
    let timeout = u64::try_from(timeout).ok().map(Duration::from_secs);
    op.wait(timeout).await;
    Ok(Response::sync(true, op.view()))
}

#[derive(Debug, Deserialize)]
pub(super) struct WebsocketQuery {
    #[serde(default)]
    pub secret: String,
}

pub(super) async fn websocket(
    State(daemon): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WebsocketQuery>,
    upgrade: Option<WebSocketUpgrade>,
) -> HttpResponse {
    let ws = match daemon.operations().get(&id) {
        Ok(op) => match op.websocket() {
            Some(ws) => ws,
            None => return daemon.respond(Err(OperationError::NoWebsocket(id).into())).await,
        },
        Err(e) => return daemon.respond(Err(e.into())).await,
    };
    let Some(upgrade) = upgrade else {
        return daemon
            .respond(Ok(Response::bad_request("websocket upgrade required")))
            .await;
    };

    upgrade.on_upgrade(move |socket| async move {
        if let Err(e) = ws.connect(&query.secret, socket).await {
            tracing::warn!(operation = %id, error = %e, "websocket connection failed");
        }
    })
}
