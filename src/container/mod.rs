// ABOUTME: In-memory container handle and its lifecycle state machine.
// ABOUTME: Verbs run under the per-container lock and delegate to storage and runtime.

mod error;
mod lock;
mod state;

pub use error::ContainerError;
pub use lock::{ContainerLock, LockInfo, LockRegistry};
pub use state::{ContainerState, ContainerView, StateAction, StatePut};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::db::{self, ContainerRecord, Datastore, DbError};
use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, RuntimeError, RuntimeState};
use crate::status::StatusCode;
use crate::storage::Storage;
use crate::types::{ContainerName, ImageId};

/// Shared collaborators every container handle needs.
#[derive(Clone)]
pub struct Backends {
    pub storage: Arc<dyn Storage>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub db: Arc<dyn Datastore>,
    pub locks: Arc<LockRegistry>,
    pub retry: RetryConfig,
    pub log_dir: PathBuf,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("storage", &self.storage.storage_type())
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

/// Where a new container's storage comes from.
#[derive(Debug, Clone)]
pub enum CreateSource {
    Empty,
    Image(ImageId),
    Copy(ContainerName),
}

/// Handle on one container or snapshot.
#[derive(Clone)]
pub struct Container {
    record: ContainerRecord,
    backends: Backends,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.record.name)
            .finish()
    }
}

fn not_found(name: &ContainerName) -> impl FnOnce(DbError) -> Error + '_ {
    move |e| match e {
        DbError::NoRows { .. } => ContainerError::NotFound(name.to_string()).into(),
        other => other.into(),
    }
}

impl Container {
    /// Load a container or snapshot by name.
    pub async fn load(backends: &Backends, name: &ContainerName) -> Result<Self> {
        let record = db::retry_read(&backends.retry, "get container", || {
            backends.db.get_container(name)
        })
        .await
        .map_err(not_found(name))?;

        Ok(Self {
            record,
            backends: backends.clone(),
        })
    }

    /// Allocate storage and register a new regular container.
    pub async fn create(
        backends: &Backends,
        name: &ContainerName,
        source: CreateSource,
    ) -> Result<Self> {
        if name.is_snapshot() {
            return Err(ContainerError::IsSnapshot(name.to_string()).into());
        }
        let _lock = backends.locks.acquire(name).await;

        let exists = db::retry_read(&backends.retry, "check container", || {
            backends.db.container_exists(name)
        })
        .await?;
        if exists {
            return Err(ContainerError::AlreadyExists(name.to_string()).into());
        }

        let image = match &source {
            CreateSource::Empty => {
                backends.storage.container_create(name).await?;
                None
            }
            CreateSource::Image(fingerprint) => {
                backends
                    .storage
                    .container_create_from_image(name, fingerprint)
                    .await?;
                Some(fingerprint.clone())
            }
            CreateSource::Copy(origin) => {
                let origin = Container::load(backends, origin).await?;
                backends.storage.container_copy(name, origin.name()).await?;
                origin.record.image.clone()
            }
        };

        let record = ContainerRecord::new(name.clone(), image);
        let inserted = db::retry_write(&backends.retry, "insert container", || {
            backends.db.insert_container(record.clone())
        })
        .await;
        if let Err(e) = inserted {
            if let Err(cleanup) = backends.storage.container_delete(name).await {
                tracing::warn!(container = %name, error = %cleanup, "failed to release storage");
            }
            return Err(e.into());
        }

        tracing::info!(container = %name, "container created");
        Ok(Self {
            record,
            backends: backends.clone(),
        })
    }

    pub fn name(&self) -> &ContainerName {
        &self.record.name
    }

    pub fn record(&self) -> &ContainerRecord {
        &self.record
    }

    pub fn is_snapshot(&self) -> bool {
        self.record.name.is_snapshot()
    }

    /// Directory holding the container's log files.
    pub fn log_path(&self) -> PathBuf {
        self.backends.log_dir.join(self.record.name.parent().as_str())
    }

    fn storage(&self) -> &dyn Storage {
        self.backends.storage.as_ref()
    }

    fn runtime(&self) -> &dyn ContainerRuntime {
        self.backends.runtime.as_ref()
    }

    fn require_regular(&self) -> Result<()> {
        if self.is_snapshot() {
            Err(ContainerError::IsSnapshot(self.name().to_string()).into())
        } else {
            Ok(())
        }
    }

    /// Stable runtime state. A container the runtime has never seen is stopped.
    async fn runtime_state(&self) -> Result<RuntimeState> {
        if self.is_snapshot() {
            return Ok(RuntimeState::Stopped);
        }
        match self.runtime().state(self.name()).await {
            Ok(state) => Ok(state),
            Err(RuntimeError::NotFound { .. }) => Ok(RuntimeState::Stopped),
            Err(e) => Err(e.into()),
        }
    }

    async fn require_stopped(&self) -> Result<()> {
        match self.runtime_state().await? {
            RuntimeState::Stopped => Ok(()),
            _ => Err(ContainerError::NotStopped(self.name().to_string()).into()),
        }
    }

    /// Execute a planned state action.
    pub async fn apply(&self, action: StateAction) -> Result<()> {
        match action {
            StateAction::Start => self.start().await,
            StateAction::Stop => self.stop().await,
            StateAction::Shutdown { timeout } => self.shutdown(timeout).await,
            StateAction::Restart { timeout, force } => self.restart(timeout, force).await,
            StateAction::Freeze => self.freeze().await,
            StateAction::Unfreeze => self.unfreeze().await,
        }
    }

    /// Stopped → Starting → Running.
    pub async fn start(&self) -> Result<()> {
        self.require_regular()?;
        let lock = self.backends.locks.acquire(self.name()).await;
        self.start_locked(&lock).await
    }

    async fn start_locked(&self, lock: &ContainerLock) -> Result<()> {
        if self.runtime_state().await? != RuntimeState::Stopped {
            return Err(ContainerError::AlreadyRunning(self.name().to_string()).into());
        }
        lock.set_transition(StatusCode::Starting);

        self.storage().container_start(self.name()).await?;
        if let Err(e) = self.runtime().start(self.name()).await {
            if let Err(release) = self.storage().container_stop(self.name()).await {
                tracing::warn!(container = %self.name(), error = %release, "failed to release storage");
            }
            return Err(e.into());
        }

        tracing::info!(container = %self.name(), "container started");
        Ok(())
    }

    /// Running|Frozen → Stopping → Stopped by killing the runtime.
    /// Stopping a stopped container succeeds.
    pub async fn stop(&self) -> Result<()> {
        self.require_regular()?;
        let lock = self.backends.locks.acquire(self.name()).await;
        self.stop_locked(&lock).await
    }

    async fn stop_locked(&self, lock: &ContainerLock) -> Result<()> {
        if self.runtime_state().await? == RuntimeState::Stopped {
            return Ok(());
        }
        lock.set_transition(StatusCode::Stopping);

        self.runtime().kill(self.name()).await?;
        self.storage().container_stop(self.name()).await?;
        tracing::info!(container = %self.name(), "container stopped");
        Ok(())
    }

    /// Graceful stop. A zero timeout is a hard stop; `None` waits forever.
    /// On expiry the container is left running.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<()> {
        self.require_regular()?;
        let lock = self.backends.locks.acquire(self.name()).await;
        self.shutdown_locked(&lock, timeout).await
    }

    async fn shutdown_locked(&self, lock: &ContainerLock, timeout: Option<Duration>) -> Result<()> {
        if timeout == Some(Duration::ZERO) {
            return self.stop_locked(lock).await;
        }

        match self.runtime_state().await? {
            RuntimeState::Stopped => return Ok(()),
            RuntimeState::Frozen => self.runtime().unfreeze(self.name()).await?,
            RuntimeState::Running | RuntimeState::Error => {}
        }
        lock.set_transition(StatusCode::Stopping);

        self.runtime().shutdown(self.name()).await?;
        if !self.runtime().wait_stopped(self.name(), timeout).await? {
            tracing::info!(container = %self.name(), ?timeout, "shutdown timed out");
            return Err(ContainerError::ShutdownTimeout {
                name: self.name().to_string(),
                timeout: timeout.unwrap_or_default(),
            }
            .into());
        }

        self.storage().container_stop(self.name()).await?;
        tracing::info!(container = %self.name(), "container shut down");
        Ok(())
    }

    /// Stop-or-shutdown then start, under one lock acquisition.
    /// A shutdown timeout fails the restart before anything is started.
    pub async fn restart(&self, timeout: Option<Duration>, force: bool) -> Result<()> {
        self.require_regular()?;
        let lock = self.backends.locks.acquire(self.name()).await;
        if force {
            self.stop_locked(&lock).await?;
        } else {
            self.shutdown_locked(&lock, timeout).await?;
        }
        self.start_locked(&lock).await
    }

    /// Running → Freezing → Frozen.
    pub async fn freeze(&self) -> Result<()> {
        self.require_regular()?;
        let lock = self.backends.locks.acquire(self.name()).await;
        if self.runtime_state().await? != RuntimeState::Running {
            return Err(ContainerError::NotRunning(self.name().to_string()).into());
        }
        lock.set_transition(StatusCode::Freezing);
        self.runtime().freeze(self.name()).await?;
        tracing::info!(container = %self.name(), "container frozen");
        Ok(())
    }

    /// Frozen → Thawed → Running.
    pub async fn unfreeze(&self) -> Result<()> {
        self.require_regular()?;
        let lock = self.backends.locks.acquire(self.name()).await;
        if self.runtime_state().await? != RuntimeState::Frozen {
            return Err(ContainerError::NotFrozen(self.name().to_string()).into());
        }
        lock.set_transition(StatusCode::Thawed);
        self.runtime().unfreeze(self.name()).await?;
        tracing::info!(container = %self.name(), "container thawed");
        Ok(())
    }

    /// Current state without side effects.
    pub async fn render_state(&self) -> Result<ContainerState> {
        if let Some(transition) = self.backends.locks.transition(self.name()) {
            if !self.is_snapshot() {
                return Ok(ContainerState::new(transition));
            }
        }

        let state = self
            .runtime_state()
            .await
            .map_err(|e| Error::internal(format!("failed to inspect {}: {}", self.name(), e)))?;
        let mut rendered = ContainerState::new(state.status());
        if state == RuntimeState::Running {
            let introspect = |e: RuntimeError| {
                Error::internal(format!("failed to inspect {}: {}", self.name(), e))
            };
            rendered.init = self.runtime().init_pid(self.name()).await.map_err(introspect)?;
            rendered.ips = self
                .runtime()
                .interfaces(self.name())
                .await
                .map_err(introspect)?;
        }
        Ok(rendered)
    }

    /// Full view: record, state and snapshot names.
    pub async fn render(&self) -> Result<ContainerView> {
        let state = self.render_state().await?;
        let snaps = if self.is_snapshot() {
            Vec::new()
        } else {
            self.snapshots()
                .await?
                .into_iter()
                .filter_map(|s| s.snapshot_name().map(str::to_string))
                .collect()
        };

        Ok(ContainerView {
            name: self.record.name.clone(),
            created_at: self.record.created_at,
            image: self.record.image.clone(),
            state,
            snaps,
        })
    }

    /// Snapshots of this container, oldest first.
    pub async fn snapshots(&self) -> Result<Vec<ContainerName>> {
        let parent = self.name().parent();
        let snaps = db::retry_read(&self.backends.retry, "list snapshots", || {
            self.backends.db.list_snapshots(&parent)
        })
        .await?;
        Ok(snaps)
    }

    /// Take a read-only snapshot named `snap`.
    pub async fn snapshot(&self, snap: &str) -> Result<Container> {
        self.require_regular()?;
        let snapshot = self.name().snapshot(snap).map_err(ContainerError::from)?;
        let _lock = self.backends.locks.acquire(self.name()).await;

        let exists = db::retry_read(&self.backends.retry, "check snapshot", || {
            self.backends.db.container_exists(&snapshot)
        })
        .await?;
        if exists {
            return Err(ContainerError::AlreadyExists(snapshot.to_string()).into());
        }

        self.storage()
            .container_snapshot_create(&snapshot, self.name())
            .await?;

        let record = ContainerRecord::new(snapshot.clone(), self.record.image.clone());
        let inserted = db::retry_write(&self.backends.retry, "insert snapshot", || {
            self.backends.db.insert_container(record.clone())
        })
        .await;
        if let Err(e) = inserted {
            if let Err(cleanup) = self.storage().container_snapshot_delete(&snapshot).await {
                tracing::warn!(snapshot = %snapshot, error = %cleanup, "failed to release storage");
            }
            return Err(e.into());
        }

        tracing::info!(snapshot = %snapshot, "snapshot created");
        Ok(Container {
            record,
            backends: self.backends.clone(),
        })
    }

    /// Replace this stopped container's storage with the snapshot `snap`.
    pub async fn restore(&self, snap: &str) -> Result<()> {
        self.require_regular()?;
        let source = self.name().snapshot(snap).map_err(ContainerError::from)?;
        let _lock = self.backends.locks.acquire(self.name()).await;

        let source = Container::load(&self.backends, &source).await?;
        self.require_stopped().await?;
        self.storage()
            .container_restore(self.name(), source.name())
            .await?;
        tracing::info!(container = %self.name(), snapshot = %source.name(), "container restored");
        Ok(())
    }

    /// Delete a stopped container with all its snapshots, or a single snapshot.
    pub async fn delete(&self) -> Result<()> {
        let _lock = self.backends.locks.acquire(self.name()).await;
        let name = self.name();

        if self.is_snapshot() {
            self.storage().container_snapshot_delete(name).await?;
        } else {
            self.require_stopped().await?;
            self.storage().container_delete(name).await?;
            match tokio::fs::remove_dir_all(self.log_path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        db::retry_write(&self.backends.retry, "remove container", || {
            self.backends.db.remove_container(name)
        })
        .await
        .map_err(not_found(name))?;

        tracing::info!(container = %name, "deleted");
        Ok(())
    }

    /// Rename a stopped container (with its snapshots), or a snapshot within its parent.
    pub async fn rename(&self, new_name: &str) -> Result<Container> {
        let target = if self.is_snapshot() {
            self.name().parent().snapshot(new_name)
        } else {
            ContainerName::new(new_name)
        }
        .map_err(ContainerError::from)?;
        if !self.is_snapshot() && target.is_snapshot() {
            return Err(ContainerError::IsSnapshot(target.to_string()).into());
        }

        let _lock = self.backends.locks.acquire(self.name()).await;
        let exists = db::retry_read(&self.backends.retry, "check container", || {
            self.backends.db.container_exists(&target)
        })
        .await?;
        if exists {
            return Err(ContainerError::AlreadyExists(target.to_string()).into());
        }

        if self.is_snapshot() {
            self.storage()
                .container_snapshot_rename(self.name(), &target)
                .await?;
        } else {
            self.require_stopped().await?;
            self.storage().container_rename(self.name(), &target).await?;
            let new_logs = self.backends.log_dir.join(target.as_str());
            match tokio::fs::rename(self.log_path(), &new_logs).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        db::retry_write(&self.backends.retry, "rename container", || {
            self.backends.db.rename_container(self.name(), &target)
        })
        .await?;

        tracing::info!(container = %self.name(), new_name = %target, "renamed");
        let mut record = self.record.clone();
        record.name = target;
        Ok(Container {
            record,
            backends: self.backends.clone(),
        })
    }
}
