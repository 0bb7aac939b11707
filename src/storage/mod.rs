// ABOUTME: Storage backend contract for container, snapshot and image filesystems.
// ABOUTME: Sealed async trait with dir, btrfs and mock drivers selected at init.

mod btrfs;
mod dir;
mod error;
mod layout;
mod mock;
mod sealed;

pub use btrfs::BtrfsStorage;
pub use dir::DirStorage;
pub use error::StorageError;
pub use layout::Layout;
pub use mock::MockStorage;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::{ContainerName, ImageId};
use sealed::Sealed;

/// Supported storage drivers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Dir,
    Btrfs,
    Mock,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Dir => "dir",
            StorageType::Btrfs => "btrfs",
            StorageType::Mock => "mock",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem operations backing containers, snapshots and cached images.
///
/// Drivers never start or stop container processes; `container_start` and
/// `container_stop` only prepare and release what the runtime needs. State
/// preconditions (e.g. "restore requires Stopped") are enforced by the caller.
#[async_trait]
pub trait Storage: Sealed + Send + Sync {
    fn storage_type(&self) -> StorageType;

    fn storage_type_name(&self) -> &'static str {
        self.storage_type().as_str()
    }

    /// Path of the container's (or snapshot's) backing storage.
    fn container_path(&self, name: &ContainerName) -> PathBuf;

    /// Allocate empty storage for a new container.
    async fn container_create(&self, name: &ContainerName) -> Result<(), StorageError>;

    /// Allocate storage for a new container, seeded from a cached image.
    async fn container_create_from_image(
        &self,
        name: &ContainerName,
        fingerprint: &ImageId,
    ) -> Result<(), StorageError>;

    /// Remove a container's storage and that of all its snapshots.
    /// Deleting absent storage succeeds.
    async fn container_delete(&self, name: &ContainerName) -> Result<(), StorageError>;

    /// Copy `source` (a container or snapshot) into a new container `name`.
    async fn container_copy(
        &self,
        name: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError>;

    /// Prepare storage before the runtime starts the container.
    async fn container_start(&self, name: &ContainerName) -> Result<(), StorageError>;

    /// Release storage after the runtime stopped the container.
    async fn container_stop(&self, name: &ContainerName) -> Result<(), StorageError>;

    /// Rename a container together with its snapshots.
    async fn container_rename(
        &self,
        name: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), StorageError>;

    /// Replace the container's contents with those of `source`.
    async fn container_restore(
        &self,
        name: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError>;

    /// Create a read-only point-in-time copy of `source`.
    async fn container_snapshot_create(
        &self,
        snapshot: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError>;

    async fn container_snapshot_delete(&self, snapshot: &ContainerName) -> Result<(), StorageError>;

    async fn container_snapshot_rename(
        &self,
        snapshot: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), StorageError>;

    /// Unpack an image into the image cache. A no-op when already cached.
    async fn image_create(&self, fingerprint: &ImageId) -> Result<(), StorageError>;

    async fn image_delete(&self, fingerprint: &ImageId) -> Result<(), StorageError>;
}

/// Construct and validate a storage driver.
pub async fn init(
    kind: StorageType,
    root: PathBuf,
    image_source: PathBuf,
) -> Result<Arc<dyn Storage>, StorageError> {
    if kind != StorageType::Mock {
        require_absolute("root", &root)?;
        require_absolute("image_source", &image_source)?;
    }

    let storage: Arc<dyn Storage> = match kind {
        StorageType::Dir => Arc::new(DirStorage::new(Layout::new(root, image_source)).await?),
        StorageType::Btrfs => {
            Arc::new(BtrfsStorage::new(Layout::new(root, image_source)).await?)
        }
        StorageType::Mock => Arc::new(MockStorage::new(root)),
    };

    tracing::info!(backend = %kind, "storage backend initialized");
    Ok(storage)
}

fn require_absolute(option: &str, path: &Path) -> Result<(), StorageError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(StorageError::Config(format!(
            "storage {} must be an absolute path, got {}",
            option,
            path.display()
        )))
    }
}
