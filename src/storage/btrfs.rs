// ABOUTME: Btrfs storage driver built on subvolumes and snapshots.
// ABOUTME: Shells out to the btrfs tool; snapshots are read-only subvolume snapshots.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::layout::{self, Layout};
use super::sealed::Sealed;
use super::{Storage, StorageError, StorageType};
use crate::types::{ContainerName, ImageId};

#[derive(Debug, Clone)]
pub struct BtrfsStorage {
    layout: Layout,
}

impl BtrfsStorage {
    pub async fn new(layout: Layout) -> Result<Self, StorageError> {
        let version = Command::new("btrfs").arg("--version").output().await;
        match version {
            Ok(output) if output.status.success() => {}
            _ => {
                return Err(StorageError::Config(
                    "btrfs backend requires the `btrfs` tool in PATH".to_string(),
                ));
            }
        }

        let storage = Self { layout };
        let layout = storage.layout.clone();
        tokio::task::spawn_blocking(move || layout.ensure()).await??;
        Ok(storage)
    }

    async fn btrfs(&self, args: &[&str]) -> Result<(), StorageError> {
        let command = format!("btrfs {}", args.join(" "));
        tracing::debug!(%command, "running");

        let output = Command::new("btrfs")
            .args(args)
            .output()
            .await
            .map_err(|e| StorageError::io(self.layout.root(), e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(StorageError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn subvolume_create(&self, path: &Path) -> Result<(), StorageError> {
        self.btrfs(&["subvolume", "create", &path.to_string_lossy()])
            .await
    }

    async fn subvolume_snapshot(
        &self,
        from: &Path,
        to: &Path,
        readonly: bool,
    ) -> Result<(), StorageError> {
        let from = from.to_string_lossy();
        let to = to.to_string_lossy();
        if readonly {
            self.btrfs(&["subvolume", "snapshot", "-r", &from, &to]).await
        } else {
            self.btrfs(&["subvolume", "snapshot", &from, &to]).await
        }
    }

    async fn subvolume_delete(&self, path: &Path) -> Result<(), StorageError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        self.btrfs(&["subvolume", "delete", &path.to_string_lossy()])
            .await
    }

    async fn ensure_absent(&self, path: &Path, name: &ContainerName) -> Result<(), StorageError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Err(StorageError::container_exists(name))
        } else {
            Ok(())
        }
    }

    async fn ensure_present(&self, path: &Path, name: &ContainerName) -> Result<(), StorageError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(StorageError::container_not_found(name))
        }
    }

    async fn create_parent(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        Ok(())
    }

    /// Image cache subvolume, unpacked from the tarball on first use.
    async fn cached_image(&self, fingerprint: &ImageId) -> Result<PathBuf, StorageError> {
        let cached = self.layout.image_path(fingerprint);
        if tokio::fs::try_exists(&cached).await.unwrap_or(false) {
            return Ok(cached);
        }

        let tarball = self.layout.image_tarball(fingerprint);
        if !tokio::fs::try_exists(&tarball).await.unwrap_or(false) {
            return Err(StorageError::NotFound {
                kind: "image",
                name: fingerprint.as_str().to_string(),
            });
        }

        self.subvolume_create(&cached).await?;
        let dest = cached.clone();
        let unpacked =
            tokio::task::spawn_blocking(move || layout::unpack_tarball(&tarball, &dest)).await?;
        if let Err(e) = unpacked {
            let _ = self.subvolume_delete(&cached).await;
            return Err(e);
        }
        Ok(cached)
    }
}

impl Sealed for BtrfsStorage {}

#[async_trait]
impl Storage for BtrfsStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::Btrfs
    }

    fn container_path(&self, name: &ContainerName) -> PathBuf {
        self.layout.container_path(name)
    }

    async fn container_create(&self, name: &ContainerName) -> Result<(), StorageError> {
        let path = self.container_path(name);
        self.ensure_absent(&path, name).await?;
        self.subvolume_create(&path).await?;
        let rootfs = path.join("rootfs");
        tokio::fs::create_dir_all(&rootfs)
            .await
            .map_err(|e| StorageError::io(&rootfs, e))
    }

    async fn container_create_from_image(
        &self,
        name: &ContainerName,
        fingerprint: &ImageId,
    ) -> Result<(), StorageError> {
        let path = self.container_path(name);
        self.ensure_absent(&path, name).await?;
        let image = self.cached_image(fingerprint).await?;
        self.subvolume_snapshot(&image, &path, false).await
    }

    async fn container_delete(&self, name: &ContainerName) -> Result<(), StorageError> {
        if !name.is_snapshot() {
            let snapshots = self.layout.snapshots_dir(name);
            if let Ok(mut entries) = tokio::fs::read_dir(&snapshots).await {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| StorageError::io(&snapshots, e))?
                {
                    self.subvolume_delete(&entry.path()).await?;
                }
                layout::remove_tree(&snapshots)?;
            }
        }
        self.subvolume_delete(&self.container_path(name)).await
    }

    async fn container_copy(
        &self,
        name: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError> {
        let from = self.container_path(source);
        let to = self.container_path(name);
        self.ensure_present(&from, source).await?;
        self.ensure_absent(&to, name).await?;
        self.create_parent(&to).await?;
        self.subvolume_snapshot(&from, &to, false).await
    }

    async fn container_start(&self, name: &ContainerName) -> Result<(), StorageError> {
        self.ensure_present(&self.container_path(name), name).await
    }

    async fn container_stop(&self, _name: &ContainerName) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_rename(
        &self,
        name: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), StorageError> {
        let from = self.container_path(name);
        let to = self.container_path(new_name);
        self.ensure_present(&from, name).await?;
        self.ensure_absent(&to, new_name).await?;
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StorageError::io(&from, e))?;

        let snapshots = self.layout.snapshots_dir(name);
        if tokio::fs::try_exists(&snapshots).await.unwrap_or(false) {
            let new_snapshots = self.layout.snapshots_dir(new_name);
            tokio::fs::rename(&snapshots, &new_snapshots)
                .await
                .map_err(|e| StorageError::io(&snapshots, e))?;
        }
        Ok(())
    }

    async fn container_restore(
        &self,
        name: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError> {
        let target = self.container_path(name);
        let from = self.container_path(source);
        self.ensure_present(&from, source).await?;

        let staging = target.with_extension("restoring");
        self.subvolume_delete(&staging).await?;
        self.subvolume_snapshot(&from, &staging, false).await?;
        self.subvolume_delete(&target).await?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| StorageError::io(&staging, e))
    }

    async fn container_snapshot_create(
        &self,
        snapshot: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError> {
        let from = self.container_path(source);
        let to = self.container_path(snapshot);
        self.ensure_present(&from, source).await?;
        self.ensure_absent(&to, snapshot).await?;
        self.create_parent(&to).await?;
        self.subvolume_snapshot(&from, &to, true).await
    }

    async fn container_snapshot_delete(&self, snapshot: &ContainerName) -> Result<(), StorageError> {
        self.subvolume_delete(&self.container_path(snapshot)).await
    }

    async fn container_snapshot_rename(
        &self,
        snapshot: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), StorageError> {
        let from = self.container_path(snapshot);
        let to = self.container_path(new_name);
        self.ensure_present(&from, snapshot).await?;
        self.ensure_absent(&to, new_name).await?;
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StorageError::io(&from, e))
    }

    async fn image_create(&self, fingerprint: &ImageId) -> Result<(), StorageError> {
        self.cached_image(fingerprint).await.map(|_| ())
    }

    async fn image_delete(&self, fingerprint: &ImageId) -> Result<(), StorageError> {
        self.subvolume_delete(&self.layout.image_path(fingerprint))
            .await
    }
}
