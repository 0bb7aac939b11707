// ABOUTME: Asynchronous operation engine: registry, status machine and completion fan-out.
// ABOUTME: Bodies run as detached tokio tasks; terminal operations are reaped after retention.

mod error;
mod task;

pub use error::OperationError;
pub use task::{FnTask, OperationBody, OperationWebsocket, Task};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::status::StatusCode;
use crate::types::OperationId;

/// Affected resources by type, e.g. `{"containers": ["web"]}`.
pub type Resources = BTreeMap<String, Vec<String>>;

/// Expand resource names into API paths: `/1.0/<type>/<name>`.
pub fn expand_resources(resources: &Resources) -> BTreeMap<String, Vec<String>> {
    resources
        .iter()
        .map(|(kind, names)| {
            let urls = names
                .iter()
                .map(|name| format!("/{}/{}/{}", crate::API_VERSION, kind, name))
                .collect();
            (kind.clone(), urls)
        })
        .collect()
}

/// Terminal result of an operation, shared by every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: StatusCode,
    pub err: Option<String>,
}

fn is_terminal(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::Success | StatusCode::Failure | StatusCode::Cancelled
    )
}

#[derive(Debug)]
struct OpState {
    status: StatusCode,
    updated_at: DateTime<Utc>,
    metadata: serde_json::Value,
    err: Option<String>,
    started: bool,
}

/// One tracked unit of work.
pub struct Operation {
    id: OperationId,
    created_at: DateTime<Utc>,
    resources: Resources,
    body: OperationBody,
    state: Mutex<OpState>,
    done: watch::Sender<Option<Outcome>>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("class", &self.body.class())
            .field("status", &self.state.lock().status)
            .finish()
    }
}

/// API rendering of an operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationView {
    pub id: String,
    pub class: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
    pub status_code: StatusCode,
    pub resources: BTreeMap<String, Vec<String>>,
    pub metadata: serde_json::Value,
    pub may_cancel: bool,
    pub err: String,
}

impl Operation {
    fn new(
        id: OperationId,
        metadata: serde_json::Value,
        resources: Resources,
        body: OperationBody,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            resources,
            body,
            state: Mutex::new(OpState {
                status: StatusCode::Pending,
                updated_at: now,
                metadata,
                err: None,
                started: false,
            }),
            done: watch::channel(None).0,
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn url(&self) -> String {
        self.id.url()
    }

    pub fn status(&self) -> StatusCode {
        self.state.lock().status
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn may_cancel(&self) -> bool {
        self.body.is_cancellable() && !is_terminal(self.status())
    }

    /// Metadata as rendered: the websocket's own for websocket bodies.
    pub fn metadata(&self) -> serde_json::Value {
        match &self.body {
            OperationBody::Websocket(ws) => ws.metadata(),
            OperationBody::Task(_) => self.state.lock().metadata.clone(),
        }
    }

    pub fn websocket(&self) -> Option<Arc<dyn OperationWebsocket>> {
        match &self.body {
            OperationBody::Websocket(ws) => Some(Arc::clone(ws)),
            OperationBody::Task(_) => None,
        }
    }

    /// Pending → Running, then run the body on its own task.
    pub fn start(self: &Arc<Self>) -> std::result::Result<(), OperationError> {
        {
            let mut state = self.state.lock();
            if state.started || state.status != StatusCode::Pending {
                return Err(OperationError::AlreadyStarted(self.id.to_string()));
            }
            state.started = true;
            state.status = StatusCode::Running;
            state.updated_at = Utc::now();
        }
        tracing::info!(operation = %self.id, class = self.body.class(), "operation started");

        let op = Arc::clone(self);
        tokio::spawn(async move {
            match op.body.run().await {
                Ok(()) => {
                    op.finish(StatusCode::Success, None);
                }
                Err(e) => {
                    op.finish(StatusCode::Failure, Some(e.to_string()));
                }
            }
        });
        Ok(())
    }

    /// Record a terminal status. Only the first terminal status sticks.
    fn finish(&self, status: StatusCode, err: Option<String>) -> bool {
        let outcome = {
            let mut state = self.state.lock();
            if is_terminal(state.status) {
                return false;
            }
            state.status = status;
            state.updated_at = Utc::now();
            if let Some(message) = &err {
                match &mut state.metadata {
                    serde_json::Value::Object(map) => {
                        map.insert("err".into(), serde_json::Value::String(message.clone()));
                    }
                    other => {
                        *other = serde_json::json!({ "err": message });
                    }
                }
            }
            state.err = err;
            Outcome {
                status,
                err: state.err.clone(),
            }
        };

        match &outcome.err {
            Some(err) => tracing::info!(operation = %self.id, %status, %err, "operation finished"),
            None => tracing::info!(operation = %self.id, %status, "operation finished"),
        }
        self.done.send_replace(Some(outcome));
        true
    }

    /// Request cancellation through the body's cancel hook.
    ///
    /// Bodies without a hook are never cancellable, whatever their status.
    pub async fn cancel(&self) -> Result<()> {
        if !self.body.is_cancellable() {
            return Err(OperationError::NotCancellable(self.id.to_string()).into());
        }
        if is_terminal(self.status()) {
            return Err(OperationError::AlreadyFinished(self.id.to_string()).into());
        }

        self.body.cancel().await?;
        self.finish(StatusCode::Cancelled, None);
        Ok(())
    }

    /// Wait for the terminal outcome; `None` if `timeout` elapsed first.
    pub async fn wait(&self, timeout: Option<Duration>) -> Option<Outcome> {
        let mut rx = self.done.subscribe();
        let wait = async move {
            rx.wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|outcome| outcome.clone())
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.ok().flatten(),
            None => wait.await,
        }
    }

    pub fn view(&self) -> OperationView {
        let metadata = self.metadata();
        let state = self.state.lock();
        OperationView {
            id: self.id.to_string(),
            class: self.body.class(),
            created_at: self.created_at,
            updated_at: state.updated_at,
            status: state.status.as_str().to_string(),
            status_code: state.status,
            resources: expand_resources(&self.resources),
            metadata,
            may_cancel: self.body.is_cancellable() && !is_terminal(state.status),
            err: state.err.clone().unwrap_or_default(),
        }
    }

    fn expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        let state = self.state.lock();
        is_terminal(state.status)
            && chrono::Duration::from_std(retention)
                .map(|retention| now - state.updated_at >= retention)
                .unwrap_or(false)
    }
}

/// All operations known to the daemon.
#[derive(Debug)]
pub struct OperationRegistry {
    operations: Mutex<HashMap<OperationId, Arc<Operation>>>,
    retention: Duration,
}

impl OperationRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Register a new Pending operation.
    pub fn create(
        &self,
        metadata: serde_json::Value,
        resources: Resources,
        body: OperationBody,
    ) -> std::result::Result<Arc<Operation>, OperationError> {
        self.create_with_id(OperationId::generate(), metadata, resources, body)
    }

    pub(crate) fn create_with_id(
        &self,
        id: OperationId,
        metadata: serde_json::Value,
        resources: Resources,
        body: OperationBody,
    ) -> std::result::Result<Arc<Operation>, OperationError> {
        let mut operations = self.operations.lock();
        if operations.contains_key(&id) {
            return Err(OperationError::IdCollision(id.to_string()));
        }

        let op = Arc::new(Operation::new(id.clone(), metadata, resources, body));
        operations.insert(id, Arc::clone(&op));
        tracing::debug!(operation = %op.id, class = op.body.class(), "operation created");
        Ok(op)
    }

    pub fn get(&self, id: &str) -> std::result::Result<Arc<Operation>, OperationError> {
        self.operations
            .lock()
            .get(&OperationId::new(id.to_string()))
            .cloned()
            .ok_or_else(|| OperationError::NotFound(id.to_string()))
    }

    pub fn start(&self, id: &str) -> std::result::Result<(), OperationError> {
        self.get(id)?.start()
    }

    pub async fn cancel(&self, id: &str) -> Result<()> {
        let op = self.get(id)?;
        op.cancel().await
    }

    /// Operation URLs grouped by lowercase status name.
    pub fn list(&self) -> BTreeMap<String, Vec<String>> {
        let operations: Vec<Arc<Operation>> = self.operations.lock().values().cloned().collect();
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for op in operations {
            grouped
                .entry(op.status().as_str().to_lowercase())
                .or_default()
                .push(op.url());
        }
        for urls in grouped.values_mut() {
            urls.sort();
        }
        grouped
    }

    /// Drop terminal operations older than the retention window.
    pub fn reap(&self) -> usize {
        let now = Utc::now();
        let mut operations = self.operations.lock();
        let before = operations.len();
        operations.retain(|_, op| !op.expired(self.retention, now));
        before - operations.len()
    }

    /// Periodically reap finished operations.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reaped = registry.reap();
                if reaped > 0 {
                    tracing::debug!(reaped, "reaped finished operations");
                }
            }
        })
    }
}
