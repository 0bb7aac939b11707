// ABOUTME: A websocket operation body for tests.
// ABOUTME: Advertises one secret and keeps running until the test releases it.

use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use parking_lot::Mutex;
use quayd::error::Result;
use quayd::operation::{OperationError, OperationWebsocket};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Notify;

pub struct ScriptedSession {
    secret: String,
    release: Arc<Notify>,
    connected: Arc<Mutex<usize>>,
}

impl ScriptedSession {
    /// Returns the session and the handle that lets `run` return.
    pub fn new(secret: &str) -> (Self, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let session = Self {
            secret: secret.to_string(),
            release: Arc::clone(&release),
            connected: Arc::new(Mutex::new(0)),
        };
        (session, release)
    }

    pub fn connections(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.connected)
    }
}

#[async_trait]
impl OperationWebsocket for ScriptedSession {
    fn metadata(&self) -> Value {
        json!({"fds": {"0": self.secret}})
    }

    async fn connect(&self, secret: &str, _socket: WebSocket) -> Result<()> {
        if secret != self.secret {
            return Err(OperationError::BadSecret.into());
        }
        *self.connected.lock() += 1;
        Ok(())
    }

    async fn run(&self) -> Result<()> {
        self.release.notified().await;
        Ok(())
    }
}
