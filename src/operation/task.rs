// ABOUTME: Operation bodies: plain tasks and websocket-backed sessions.
// ABOUTME: FnTask adapts a run-once async closure with an optional cancel hook.

use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Unit of work run by an operation.
#[async_trait]
pub trait Task: Send + Sync {
    /// Runs exactly once per operation.
    async fn run(&self) -> Result<()>;

    fn is_cancellable(&self) -> bool {
        false
    }

    /// Request cooperative termination. Does not preempt `run`.
    async fn cancel(&self) -> Result<()> {
        Err(Error::internal("task has no cancel hook"))
    }
}

/// Operation body that talks to clients over websockets.
#[async_trait]
pub trait OperationWebsocket: Send + Sync {
    /// Rendered in place of the operation's generic metadata
    /// (typically the secrets clients must present to connect).
    fn metadata(&self) -> serde_json::Value;

    /// Attach a client socket presenting `secret`.
    async fn connect(&self, secret: &str, socket: WebSocket) -> Result<()>;

    /// Drive the session until it ends.
    async fn run(&self) -> Result<()>;

    fn is_cancellable(&self) -> bool {
        false
    }

    async fn cancel(&self) -> Result<()> {
        Err(Error::internal("websocket has no cancel hook"))
    }
}

/// The two shapes an operation body can take.
#[derive(Clone)]
pub enum OperationBody {
    Task(Arc<dyn Task>),
    Websocket(Arc<dyn OperationWebsocket>),
}

impl std::fmt::Debug for OperationBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class())
    }
}

impl OperationBody {
    pub fn task(task: impl Task + 'static) -> Self {
        OperationBody::Task(Arc::new(task))
    }

    pub fn websocket(ws: impl OperationWebsocket + 'static) -> Self {
        OperationBody::Websocket(Arc::new(ws))
    }

    /// Operation class as rendered in the API.
    pub fn class(&self) -> &'static str {
        match self {
            OperationBody::Task(_) => "task",
            OperationBody::Websocket(_) => "websocket",
        }
    }

    pub fn is_cancellable(&self) -> bool {
        match self {
            OperationBody::Task(t) => t.is_cancellable(),
            OperationBody::Websocket(ws) => ws.is_cancellable(),
        }
    }

    pub(super) async fn run(&self) -> Result<()> {
        match self {
            OperationBody::Task(t) => t.run().await,
            OperationBody::Websocket(ws) => ws.run().await,
        }
    }

    pub(super) async fn cancel(&self) -> Result<()> {
        match self {
            OperationBody::Task(t) => t.cancel().await,
            OperationBody::Websocket(ws) => ws.cancel().await,
        }
    }
}

type RunFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;
type CancelFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Task built from an async closure.
pub struct FnTask {
    run: Mutex<Option<RunFn>>,
    cancel: Option<CancelFn>,
}

impl FnTask {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            run: Mutex::new(Some(Box::new(move || Box::pin(run())))),
            cancel: None,
        }
    }

    /// Attach a cancel hook, making the task cancellable.
    pub fn with_cancel<C, Fut>(mut self, cancel: C) -> Self
    where
        C: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.cancel = Some(Box::new(move || Box::pin(cancel())));
        self
    }
}

#[async_trait]
impl Task for FnTask {
    async fn run(&self) -> Result<()> {
        let run = self
            .run
            .lock()
            .take()
            .ok_or_else(|| Error::internal("task already ran"))?;
        run().await
    }

    fn is_cancellable(&self) -> bool {
        self.cancel.is_some()
    }

    async fn cancel(&self) -> Result<()> {
        match &self.cancel {
            Some(cancel) => cancel().await,
            None => Err(Error::internal("task has no cancel hook")),
        }
    }
}
