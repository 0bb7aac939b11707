// ABOUTME: In-memory container runtime for lifecycle tests.
// ABOUTME: Records every call and can be told to ignore shutdown or fail start.

use async_trait::async_trait;
use parking_lot::Mutex;
use quayd::runtime::{ContainerRuntime, NetworkAddress, RuntimeError, RuntimeState};
use quayd::types::ContainerName;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakeRuntime {
    states: Mutex<HashMap<String, RuntimeState>>,
    calls: Mutex<Vec<String>>,
    ignore_shutdown: AtomicBool,
    fail_start: AtomicBool,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, name: &str, state: RuntimeState) {
        self.states.lock().insert(name.to_string(), state);
    }

    pub fn current(&self, name: &str) -> RuntimeState {
        self.states
            .lock()
            .get(name)
            .copied()
            .unwrap_or(RuntimeState::Stopped)
    }

    /// Graceful shutdown requests are accepted but never take effect.
    pub fn ignore_shutdown(&self) {
        self.ignore_shutdown.store(true, Ordering::SeqCst);
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Calls made so far, e.g. `["start web", "kill web"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str, name: &ContainerName) {
        self.calls.lock().push(format!("{} {}", call, name));
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn start(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.record("start", name);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RuntimeError::CommandFailed {
                command: "start".into(),
                code: 1,
                stderr: "boot failed".into(),
            });
        }
        self.set_state(name.as_str(), RuntimeState::Running);
        Ok(())
    }

    async fn kill(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.record("kill", name);
        self.set_state(name.as_str(), RuntimeState::Stopped);
        Ok(())
    }

    async fn shutdown(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.record("shutdown", name);
        if !self.ignore_shutdown.load(Ordering::SeqCst) {
            self.set_state(name.as_str(), RuntimeState::Stopped);
        }
        Ok(())
    }

    async fn wait_stopped(
        &self,
        name: &ContainerName,
        timeout: Option<Duration>,
    ) -> Result<bool, RuntimeError> {
        if self.current(name.as_str()) == RuntimeState::Stopped {
            return Ok(true);
        }
        match timeout {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                Ok(self.current(name.as_str()) == RuntimeState::Stopped)
            }
            None => std::future::pending().await,
        }
    }

    async fn freeze(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.record("freeze", name);
        self.set_state(name.as_str(), RuntimeState::Frozen);
        Ok(())
    }

    async fn unfreeze(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.record("unfreeze", name);
        self.set_state(name.as_str(), RuntimeState::Running);
        Ok(())
    }

    async fn state(&self, name: &ContainerName) -> Result<RuntimeState, RuntimeError> {
        Ok(self.current(name.as_str()))
    }

    async fn init_pid(&self, _name: &ContainerName) -> Result<Option<u32>, RuntimeError> {
        Ok(Some(4242))
    }

    async fn interfaces(&self, _name: &ContainerName) -> Result<Vec<NetworkAddress>, RuntimeError> {
        Ok(vec![NetworkAddress {
            interface: "eth0".into(),
            protocol: "IPV4".into(),
            address: "10.0.3.15".into(),
            host_veth: Some("vethA1B2C3".into()),
        }])
    }
}
