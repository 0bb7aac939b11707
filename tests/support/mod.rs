// ABOUTME: Test support utilities.
// ABOUTME: Builds daemons around a fake runtime and a flaky datastore, plus HTTP helpers.

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod fake_runtime;
#[allow(dead_code)]
pub mod flaky_datastore;
#[allow(dead_code)]
pub mod session;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use fake_runtime::FakeRuntime;
use flaky_datastore::FlakyDatastore;
use http_body_util::BodyExt;
use quayd::config::{DaemonConfig, RetryConfig};
use quayd::container::{Container, CreateSource};
use quayd::daemon::Daemon;
use quayd::runtime::RuntimeState;
use quayd::storage::{self, StorageType};
use quayd::types::ContainerName;
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("quayd=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A daemon wired to test doubles inside a temporary data directory.
#[allow(dead_code)]
pub struct TestDaemon {
    pub daemon: Arc<Daemon>,
    pub runtime: Arc<FakeRuntime>,
    pub db: Arc<FlakyDatastore>,
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TestDaemon {
    /// Mock storage, fast read backoff.
    pub async fn new() -> Self {
        Self::with_storage(StorageType::Mock).await
    }

    pub async fn with_storage(kind: StorageType) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig {
            data_dir: dir.path().to_path_buf(),
            retry: RetryConfig {
                read_backoff: Duration::from_millis(20),
                write_backoff: Duration::from_millis(5),
                ..RetryConfig::default()
            },
            debug: true,
            ..DaemonConfig::default()
        };

        let storage = storage::init(kind, config.storage_root(), config.image_source())
            .await
            .unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let db = Arc::new(FlakyDatastore::open(&config.database_path()));
        let daemon = Daemon::with_backends(config, storage, runtime.clone(), db.clone());

        Self {
            daemon,
            runtime,
            db,
            dir,
        }
    }

    pub fn router(&self) -> Router {
        quayd::api::router(Arc::clone(&self.daemon))
    }

    /// Create an empty container and put it in `state`.
    pub async fn add_container(&self, name: &str, state: RuntimeState) -> Container {
        let name = ContainerName::new(name).unwrap();
        let container = Container::create(self.daemon.backends(), &name, CreateSource::Empty)
            .await
            .unwrap();
        self.runtime.set_state(name.as_str(), state);
        container
    }
}

/// Send one request through the router and decode the JSON body.
#[allow(dead_code)]
pub async fn request(
    router: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(serde_json::to_vec(&json).unwrap()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Send raw bytes, with an optional Content-Type, and decode the JSON reply.
#[allow(dead_code)]
pub async fn raw_request(
    router: Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: &'static [u8],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(Body::from(body)).unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Poll an operation until it reaches a terminal status.
#[allow(dead_code)]
pub async fn wait_operation(router: Router, url: &str) -> Value {
    let (status, body) = request(router, Method::GET, &format!("{}/wait?timeout=5", url), None).await;
    assert_eq!(status, StatusCode::OK);
    body["metadata"].clone()
}
