// ABOUTME: REST API router mapping /1.0 paths to handlers.
// ABOUTME: Handlers build a Response and let the daemon render it.

mod containers;
mod logs;
mod operations;
pub mod server;
mod snapshots;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response as HttpResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

use crate::daemon::Daemon;
use crate::response::Response;

/// Application state shared with handlers.
pub type AppState = Arc<Daemon>;

/// Decode a JSON request body. The Content-Type header is not checked, and
/// malformed or incomplete bodies surface as `Error::Json` (400).
pub(crate) fn decode_body<T: DeserializeOwned>(body: &Bytes) -> crate::error::Result<T> {
    Ok(serde_json::from_slice(body)?)
}

/// `?recursion=N`: 0 returns URLs, anything else full objects.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecursionQuery {
    #[serde(default)]
    pub recursion: u32,
}

/// Creates the API router with all endpoints.
pub fn router(daemon: AppState) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/1.0", get(server_info))
        .route(
            "/1.0/containers",
            get(containers::list).post(containers::create),
        )
        .route(
            "/1.0/containers/:name",
            get(containers::get)
                .put(containers::restore)
                .post(containers::rename)
                .delete(containers::delete),
        )
        .route(
            "/1.0/containers/:name/state",
            get(containers::state_get).put(containers::state_put),
        )
        .route(
            "/1.0/containers/:name/snapshots",
            get(snapshots::list).post(snapshots::create),
        )
        .route(
            "/1.0/containers/:name/snapshots/:snap",
            get(snapshots::get)
                .post(snapshots::rename)
                .delete(snapshots::delete),
        )
        .route("/1.0/containers/:name/logs", get(logs::list))
        .route("/1.0/containers/:name/logs/:file", get(logs::get))
        .route("/1.0/operations", get(operations::list))
        .route(
            "/1.0/operations/:id",
            get(operations::get).delete(operations::cancel),
        )
        .route("/1.0/operations/:id/wait", get(operations::wait))
        .route("/1.0/operations/:id/websocket", get(operations::websocket))
        .fallback(fallback)
        .with_state(daemon)
}

async fn api_root(State(daemon): State<AppState>) -> HttpResponse {
    let versions = vec![format!("/{}", crate::API_VERSION)];
    daemon.respond(Ok(Response::sync(true, versions))).await
}

async fn server_info(State(daemon): State<AppState>) -> HttpResponse {
    let info = json!({
        "api_version": crate::API_VERSION,
        "server_name": gethostname::gethostname().to_string_lossy(),
        "environment": {
            "server": "quayd",
            "server_version": env!("CARGO_PKG_VERSION"),
            "server_pid": std::process::id(),
            "storage": daemon.backends().storage.storage_type_name(),
        },
    });
    daemon.respond(Ok(Response::sync(true, info))).await
}

async fn fallback(State(daemon): State<AppState>) -> HttpResponse {
    daemon.respond(Ok(Response::not_found("resource"))).await
}
