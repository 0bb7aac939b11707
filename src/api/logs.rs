// ABOUTME: Container log file handlers.
// ABOUTME: Lists log files, serves one inline, or bundles all of them as multipart.

use axum::extract::{Path, Query, State};
use axum::response::Response as HttpResponse;
use serde::Deserialize;

use super::AppState;
use super::containers::container_url;
use crate::daemon::Daemon;
use crate::error::{Error, Result};
use crate::response::{Response, ResponseFile};

#[derive(Debug, Default, Deserialize)]
pub(super) struct LogsQuery {
    #[serde(default)]
    pub download: u32,
}

/// Log file names are plain file names inside the container's log directory.
fn valid_log_name(file: &str) -> bool {
    !file.is_empty() && file != "." && file != ".." && !file.contains('/') && !file.contains('\\')
}

async fn log_files(daemon: &Daemon, name: &str) -> Result<(std::path::PathBuf, Vec<String>)> {
    let container = daemon.load_container(name).await?;
    let dir = container.log_path();

    let mut files = Vec::new();
    match tokio::fs::read_dir(&dir).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    files.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    files.sort();
    Ok((dir, files))
}

pub(super) async fn list(
    State(daemon): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> HttpResponse {
    daemon.respond(list_logs(&daemon, &name, query.download != 0).await).await
}

async fn list_logs(daemon: &Daemon, name: &str, download: bool) -> Result<Response> {
    let (dir, files) = log_files(daemon, name).await?;

    if download {
        let files = files
            .into_iter()
            .map(|file| ResponseFile::new(file.clone(), dir.join(&file), file))
            .collect();
        return Ok(Response::file(files, Vec::new(), false));
    }

    let urls: Vec<String> = files
        .iter()
        .map(|file| format!("{}/logs/{}", container_url(name), urlencoding::encode(file)))
        .collect();
    Ok(Response::sync(true, urls))
}

pub(super) async fn get(
    State(daemon): State<AppState>,
    Path((name, file)): Path<(String, String)>,
) -> HttpResponse {
    daemon.respond(get_log(&daemon, &name, &file).await).await
}

async fn get_log(daemon: &Daemon, name: &str, file: &str) -> Result<Response> {
    if !valid_log_name(file) {
        return Err(Error::BadRequest(format!("invalid log file name: {}", file)));
    }
    let container = daemon.load_container(name).await?;
    let path = container.log_path().join(file);
    Ok(Response::file(
        vec![ResponseFile::new(file, path, file)],
        Vec::new(),
        false,
    ))
}
