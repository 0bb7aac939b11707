// ABOUTME: Daemon wiring: storage, runtime, datastore, locks and the operation registry.
// ABOUTME: Shared by every request handler as axum state.

use axum::response::Response as HttpResponse;
use std::sync::Arc;

use crate::config::DaemonConfig;
use crate::container::{Backends, Container, ContainerError, LockRegistry};
use crate::db::{Datastore, JsonDatastore};
use crate::error::Result;
use crate::operation::OperationRegistry;
use crate::response::{RenderContext, Response, ResponseConfig};
use crate::runtime::{ContainerRuntime, LxcRuntime};
use crate::storage::{self, Storage};
use crate::types::ContainerName;

pub struct Daemon {
    config: DaemonConfig,
    backends: Backends,
    operations: Arc<OperationRegistry>,
    render: RenderContext,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("data_dir", &self.config.data_dir)
            .field("backends", &self.backends)
            .finish()
    }
}

impl Daemon {
    /// Build the daemon from configuration with the real drivers.
    pub async fn new(config: DaemonConfig) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        tokio::fs::create_dir_all(config.log_dir()).await?;

        let storage = storage::init(
            config.storage.backend,
            config.storage_root(),
            config.image_source(),
        )
        .await?;
        let runtime = Arc::new(LxcRuntime::new(config.lxc_path()));
        let db = Arc::new(JsonDatastore::open(config.database_path())?);

        Ok(Self::with_backends(config, storage, runtime, db))
    }

    /// Build the daemon around explicit collaborators.
    pub fn with_backends(
        config: DaemonConfig,
        storage: Arc<dyn Storage>,
        runtime: Arc<dyn ContainerRuntime>,
        db: Arc<dyn Datastore>,
    ) -> Arc<Self> {
        let operations = Arc::new(OperationRegistry::new(config.operations.retention));
        let backends = Backends {
            storage,
            runtime,
            db,
            locks: Arc::new(LockRegistry::new()),
            retry: config.retry.clone(),
            log_dir: config.log_dir(),
        };
        let render = RenderContext {
            operations: Arc::clone(&operations),
            config: ResponseConfig {
                debug: config.debug,
            },
        };

        Arc::new(Self {
            config,
            backends,
            operations,
            render,
        })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn operations(&self) -> &Arc<OperationRegistry> {
        &self.operations
    }

    /// Start background housekeeping.
    pub fn spawn_housekeeping(&self) {
        self.operations
            .spawn_reaper(self.config.operations.reap_interval);
    }

    pub fn parse_name(name: &str) -> Result<ContainerName> {
        ContainerName::new(name).map_err(|e| ContainerError::from(e).into())
    }

    /// Load a container (or `parent/snap` snapshot) by name.
    pub async fn load_container(&self, name: &str) -> Result<Container> {
        let name = Self::parse_name(name)?;
        Container::load(&self.backends, &name).await
    }

    /// Render a handler's outcome.
    pub async fn respond(&self, result: Result<Response>) -> HttpResponse {
        let response = result.unwrap_or_else(Response::from);
        response.render(&self.render).await
    }
}
