// ABOUTME: Container collection and container resource handlers.
// ABOUTME: Lifecycle changes are returned as async operations; reads are sync.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Response as HttpResponse;
use serde::Deserialize;

use super::{AppState, RecursionQuery, decode_body};
use crate::container::{Container, CreateSource, StatePut};
use crate::daemon::Daemon;
use crate::db::{self, ContainerKind};
use crate::error::{Error, Result};
use crate::operation::FnTask;
use crate::response::Response;
use crate::types::ImageId;

pub(super) fn container_url(name: &str) -> String {
    format!("/{}/containers/{}", crate::API_VERSION, name)
}

pub(super) async fn list(
    State(daemon): State<AppState>,
    Query(query): Query<RecursionQuery>,
) -> HttpResponse {
    daemon.respond(list_containers(&daemon, query.recursion).await).await
}

async fn list_containers(daemon: &Daemon, recursion: u32) -> Result<Response> {
    let backends = daemon.backends();
    let names = db::retry_read(&backends.retry, "list containers", || {
        backends.db.list_containers(ContainerKind::Regular)
    })
    .await?;

    if recursion == 0 {
        let urls: Vec<String> = names.iter().map(|n| container_url(n.as_str())).collect();
        return Ok(Response::sync(true, urls));
    }

    let mut views = Vec::with_capacity(names.len());
    for name in &names {
        let view = match Container::load(backends, name).await {
            Ok(container) => container.render().await,
            Err(e) => Err(e),
        };
        match view {
            Ok(view) => views.push(view),
            Err(e) => tracing::warn!(container = %name, error = %e, "skipping container"),
        }
    }
    Ok(Response::sync(true, views))
}

#[derive(Debug, Deserialize)]
pub(super) struct ContainerSource {
    #[serde(rename = "type", default = "default_source_type")]
    pub kind: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_source_type() -> String {
    "none".to_string()
}

#[derive(Debug, Deserialize)]
pub(super) struct ContainersPost {
    pub name: String,
    #[serde(default)]
    pub source: Option<ContainerSource>,
}

impl ContainersPost {
    fn create_source(&self) -> Result<CreateSource> {
        let Some(source) = &self.source else {
            return Ok(CreateSource::Empty);
        };
        match source.kind.as_str() {
            "none" => Ok(CreateSource::Empty),
            "image" => {
                let fingerprint = source
                    .fingerprint
                    .as_deref()
                    .ok_or_else(|| Error::BadRequest("image source requires a fingerprint".into()))?;
                let fingerprint = ImageId::fingerprint(fingerprint)
                    .map_err(|e| Error::BadRequest(e.to_string()))?;
                Ok(CreateSource::Image(fingerprint))
            }
            "copy" => {
                let origin = source
                    .source
                    .as_deref()
                    .ok_or_else(|| Error::BadRequest("copy source requires a source".into()))?;
                Ok(CreateSource::Copy(Daemon::parse_name(origin)?))
            }
            other => Err(Error::BadRequest(format!("unknown source type: {}", other))),
        }
    }
}

pub(super) async fn create(
    State(daemon): State<AppState>,
    body: Bytes,
) -> HttpResponse {
    daemon.respond(create_container(&daemon, &body)).await
}

fn create_container(daemon: &Daemon, body: &Bytes) -> Result<Response> {
    let req: ContainersPost = decode_body(body)?;
    let name = Daemon::parse_name(&req.name)?;
    if name.is_snapshot() {
        return Err(Error::BadRequest(format!("{} is a snapshot name", name)));
    }
    let source = req.create_source()?;

    let backends = daemon.backends().clone();
    let target = name.clone();
    let task = FnTask::new(move || async move {
        Container::create(&backends, &target, source).await.map(|_| ())
    });
    Ok(Response::task(task)
        .resources("containers", [name.as_str()])
        .into())
}

pub(super) async fn get(State(daemon): State<AppState>, Path(name): Path<String>) -> HttpResponse {
    daemon.respond(get_container(&daemon, &name).await).await
}

async fn get_container(daemon: &Daemon, name: &str) -> Result<Response> {
    let container = daemon.load_container(name).await?;
    Ok(Response::sync(true, container.render().await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct ContainerPut {
    #[serde(default)]
    pub restore: Option<String>,
}

pub(super) async fn restore(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> HttpResponse {
    daemon.respond(restore_container(&daemon, &name, &body).await).await
}

async fn restore_container(daemon: &Daemon, name: &str, body: &Bytes) -> Result<Response> {
    let req: ContainerPut = decode_body(body)?;
    let Some(snap) = req.restore else {
        return Ok(Response::bad_request("only restore is supported"));
    };
    let container = daemon.load_container(name).await?;
    let resource = container.name().to_string();
    let task = FnTask::new(move || async move { container.restore(&snap).await });
    Ok(Response::task(task).resources("containers", [resource]).into())
}

#[derive(Debug, Deserialize)]
pub(super) struct RenamePost {
    pub name: String,
}

pub(super) async fn rename(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> HttpResponse {
    daemon.respond(rename_container(&daemon, &name, &body).await).await
}

async fn rename_container(daemon: &Daemon, name: &str, body: &Bytes) -> Result<Response> {
    let req: RenamePost = decode_body(body)?;
    let container = daemon.load_container(name).await?;
    let resource = container.name().to_string();
    let task = FnTask::new(move || async move { container.rename(&req.name).await.map(|_| ()) });
    Ok(Response::task(task).resources("containers", [resource]).into())
}

pub(super) async fn delete(State(daemon): State<AppState>, Path(name): Path<String>) -> HttpResponse {
    daemon.respond(delete_container(&daemon, &name).await).await
}

async fn delete_container(daemon: &Daemon, name: &str) -> Result<Response> {
    let container = daemon.load_container(name).await?;
    let resource = container.name().to_string();
    let task = FnTask::new(move || async move { container.delete().await });
    Ok(Response::task(task).resources("containers", [resource]).into())
}

pub(super) async fn state_get(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
) -> HttpResponse {
    daemon.respond(get_state(&daemon, &name).await).await
}

async fn get_state(daemon: &Daemon, name: &str) -> Result<Response> {
    let container = daemon.load_container(name).await?;
    Ok(Response::sync(true, container.render_state().await?))
}

pub(super) async fn state_put(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> HttpResponse {
    daemon.respond(put_state(&daemon, &name, &body).await).await
}

async fn put_state(daemon: &Daemon, name: &str, body: &Bytes) -> Result<Response> {
    let req: StatePut = decode_body(body)?;
    let action = req.plan()?;
    let container = daemon.load_container(name).await?;
    let resource = container.name().to_string();
    let task = FnTask::new(move || async move { container.apply(action).await });
    Ok(Response::task(task).resources("containers", [resource]).into())
}
