// ABOUTME: Contract for the external container runtime that owns container processes.
// ABOUTME: Start/kill/signal/wait primitives plus state and network introspection.

mod error;
mod lxc;

pub use error::RuntimeError;
pub use lxc::LxcRuntime;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::status::StatusCode;
use crate::types::ContainerName;

/// Stable state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Stopped,
    Running,
    Frozen,
    Error,
}

impl RuntimeState {
    pub fn status(&self) -> StatusCode {
        match self {
            RuntimeState::Stopped => StatusCode::Stopped,
            RuntimeState::Running => StatusCode::Running,
            RuntimeState::Frozen => StatusCode::Frozen,
            RuntimeState::Error => StatusCode::Error,
        }
    }
}

/// One address assigned to a container interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkAddress {
    pub interface: String,
    pub protocol: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_veth: Option<String>,
}

/// Process control for containers, keyed by name.
///
/// Implementations only drive the runtime; storage bookkeeping and state
/// preconditions live in [`crate::container::Container`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Boot the container in the background.
    async fn start(&self, name: &ContainerName) -> Result<(), RuntimeError>;

    /// Kill the container immediately.
    async fn kill(&self, name: &ContainerName) -> Result<(), RuntimeError>;

    /// Ask the container's init to shut down; returns without waiting.
    async fn shutdown(&self, name: &ContainerName) -> Result<(), RuntimeError>;

    /// Wait until the container is stopped. `None` waits forever.
    /// Returns false if the deadline passed first.
    async fn wait_stopped(
        &self,
        name: &ContainerName,
        timeout: Option<Duration>,
    ) -> Result<bool, RuntimeError>;

    async fn freeze(&self, name: &ContainerName) -> Result<(), RuntimeError>;

    async fn unfreeze(&self, name: &ContainerName) -> Result<(), RuntimeError>;

    async fn state(&self, name: &ContainerName) -> Result<RuntimeState, RuntimeError>;

    async fn init_pid(&self, name: &ContainerName) -> Result<Option<u32>, RuntimeError>;

    async fn interfaces(&self, name: &ContainerName) -> Result<Vec<NetworkAddress>, RuntimeError>;
}
