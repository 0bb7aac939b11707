// ABOUTME: File responses: a single inline file or several as multipart/form-data.
// ABOUTME: Files are read fully before anything is sent; any I/O failure aborts the response.

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use bytes::{BufMut, Bytes, BytesMut};
use std::path::PathBuf;

use crate::error::Error;

/// One file to serve.
#[derive(Debug, Clone)]
pub struct ResponseFile {
    /// Form field name in multipart bodies.
    pub identifier: String,
    pub path: PathBuf,
    /// Name presented to the client.
    pub filename: String,
}

impl ResponseFile {
    pub fn new(identifier: impl Into<String>, path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            path: path.into(),
            filename: filename.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileResponse {
    pub files: Vec<ResponseFile>,
    pub headers: Vec<(String, String)>,
    pub remove_after_serve: bool,
}

impl FileResponse {
    pub(super) async fn render(self) -> Result<axum::response::Response, Error> {
        let mut builder = axum::response::Response::builder().status(StatusCode::OK);
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => tracing::warn!(header = %name, "skipping invalid response header"),
            }
        }

        let body = match self.files.as_slice() {
            [] => Bytes::new(),
            [file] => {
                let content = tokio::fs::read(&file.path).await?;
                builder = builder
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .header(
                        CONTENT_DISPOSITION,
                        format!("inline;filename={}", urlencoding::encode(&file.filename)),
                    );
                Bytes::from(content)
            }
            files => {
                // Names are percent-encoded so quotes cannot break the part headers.
                let boundary = uuid::Uuid::new_v4().simple().to_string();
                let mut body = BytesMut::new();
                for file in files {
                    let content = tokio::fs::read(&file.path).await?;
                    body.put_slice(
                        format!(
                            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            boundary,
                            urlencoding::encode(&file.identifier),
                            urlencoding::encode(&file.filename)
                        )
                        .as_bytes(),
                    );
                    body.put_slice(&content);
                    body.put_slice(b"\r\n");
                }
                body.put_slice(format!("--{}--\r\n", boundary).as_bytes());
                builder = builder.header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                );
                body.freeze()
            }
        };

        if self.remove_after_serve {
            for file in &self.files {
                if let Err(e) = tokio::fs::remove_file(&file.path).await {
                    tracing::warn!(path = %file.path.display(), error = %e, "failed to remove served file");
                }
            }
        }

        builder
            .header(CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .map_err(|e| Error::internal(e.to_string()))
    }
}
