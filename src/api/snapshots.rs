// ABOUTME: Snapshot handlers under /1.0/containers/{name}/snapshots.
// ABOUTME: Snapshots are addressed as parent/snap internally.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Response as HttpResponse;
use serde::Deserialize;

use super::containers::container_url;
use super::{AppState, RecursionQuery, decode_body};
use crate::container::{Container, ContainerError};
use crate::daemon::Daemon;
use crate::error::Result;
use crate::operation::FnTask;
use crate::response::Response;

fn snapshot_path(name: &str, snap: &str) -> String {
    format!("{}{}{}", name, crate::types::SNAPSHOT_DELIMITER, snap)
}

pub(super) async fn list(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RecursionQuery>,
) -> HttpResponse {
    daemon
        .respond(list_snapshots(&daemon, &name, query.recursion).await)
        .await
}

async fn list_snapshots(daemon: &Daemon, name: &str, recursion: u32) -> Result<Response> {
    let container = daemon.load_container(name).await?;
    let snapshots = container.snapshots().await?;

    if recursion == 0 {
        let urls: Vec<String> = snapshots
            .iter()
            .filter_map(|s| {
                let snap = s.snapshot_name()?;
                Some(format!(
                    "{}/snapshots/{}",
                    container_url(name),
                    urlencoding::encode(snap)
                ))
            })
            .collect();
        return Ok(Response::sync(true, urls));
    }

    let mut views = Vec::with_capacity(snapshots.len());
    for snapshot in &snapshots {
        let view = match Container::load(daemon.backends(), snapshot).await {
            Ok(snap) => snap.render().await,
            Err(e) => Err(e),
        };
        match view {
            Ok(view) => views.push(view),
            Err(e) => tracing::warn!(snapshot = %snapshot, error = %e, "skipping snapshot"),
        }
    }
    Ok(Response::sync(true, views))
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapshotPost {
    pub name: String,
}

pub(super) async fn create(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> HttpResponse {
    daemon.respond(create_snapshot(&daemon, &name, &body).await).await
}

async fn create_snapshot(daemon: &Daemon, name: &str, body: &Bytes) -> Result<Response> {
    let req: SnapshotPost = decode_body(body)?;
    let container = daemon.load_container(name).await?;
    container
        .name()
        .snapshot(&req.name)
        .map_err(ContainerError::from)?;
    let resource = container.name().to_string();

    let task = FnTask::new(move || async move { container.snapshot(&req.name).await.map(|_| ()) });
    Ok(Response::task(task).resources("containers", [resource]).into())
}

pub(super) async fn get(
    State(daemon): State<AppState>,
    Path((name, snap)): Path<(String, String)>,
) -> HttpResponse {
    daemon.respond(get_snapshot(&daemon, &name, &snap).await).await
}

async fn get_snapshot(daemon: &Daemon, name: &str, snap: &str) -> Result<Response> {
    let snapshot = daemon.load_container(&snapshot_path(name, snap)).await?;
    Ok(Response::sync(true, snapshot.render().await?))
}

pub(super) async fn rename(
    State(daemon): State<AppState>,
    Path((name, snap)): Path<(String, String)>,
    body: Bytes,
) -> HttpResponse {
    daemon
        .respond(rename_snapshot(&daemon, &name, &snap, &body).await)
        .await
}

async fn rename_snapshot(
    daemon: &Daemon,
    name: &str,
    snap: &str,
    body: &Bytes,
) -> Result<Response> {
    let req: SnapshotPost = decode_body(body)?;
    let snapshot = daemon.load_container(&snapshot_path(name, snap)).await?;
    let resource = snapshot.name().parent().to_string();
    let task = FnTask::new(move || async move { snapshot.rename(&req.name).await.map(|_| ()) });
    Ok(Response::task(task).resources("containers", [resource]).into())
}

pub(super) async fn delete(
    State(daemon): State<AppState>,
    Path((name, snap)): Path<(String, String)>,
) -> HttpResponse {
    daemon.respond(delete_snapshot(&daemon, &name, &snap).await).await
}

async fn delete_snapshot(daemon: &Daemon, name: &str, snap: &str) -> Result<Response> {
    let snapshot = daemon.load_container(&snapshot_path(name, snap)).await?;
    let resource = snapshot.name().parent().to_string();
    let task = FnTask::new(move || async move { snapshot.delete().await });
    Ok(Response::task(task).resources("containers", [resource]).into())
}
