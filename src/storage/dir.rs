// ABOUTME: Plain-directory storage driver.
// ABOUTME: Copies whole trees on the blocking pool; works on any local filesystem.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use super::layout::{self, Layout};
use super::sealed::Sealed;
use super::{Storage, StorageError, StorageType};
use crate::types::{ContainerName, ImageId};

#[derive(Debug, Clone)]
pub struct DirStorage {
    layout: Layout,
}

impl DirStorage {
    pub async fn new(layout: Layout) -> Result<Self, StorageError> {
        let storage = Self { layout };
        let layout = storage.layout.clone();
        blocking(move || layout.ensure()).await?;
        Ok(storage)
    }
}

/// Run a filesystem job on the blocking pool.
async fn blocking<F>(job: F) -> Result<(), StorageError>
where
    F: FnOnce() -> Result<(), StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await?
}

fn ensure_absent(path: &Path, name: &ContainerName) -> Result<(), StorageError> {
    if path.exists() {
        Err(StorageError::container_exists(name))
    } else {
        Ok(())
    }
}

fn ensure_present(path: &Path, name: &ContainerName) -> Result<(), StorageError> {
    if path.exists() {
        Ok(())
    } else {
        Err(StorageError::container_not_found(name))
    }
}

fn create_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    Ok(())
}

fn rename(from: &Path, to: &Path) -> Result<(), StorageError> {
    fs::rename(from, to).map_err(|e| StorageError::io(from, e))
}

/// Unpack the image tarball into the cache unless it is already there.
fn unpack_image(layout: &Layout, fingerprint: &ImageId) -> Result<PathBuf, StorageError> {
    let cached = layout.image_path(fingerprint);
    if cached.is_dir() {
        return Ok(cached);
    }

    let tarball = layout.image_tarball(fingerprint);
    if !tarball.is_file() {
        return Err(StorageError::NotFound {
            kind: "image",
            name: fingerprint.as_str().to_string(),
        });
    }

    let staging = cached.with_extension("unpacking");
    layout::remove_tree(&staging)?;
    if let Err(e) = layout::unpack_tarball(&tarball, &staging) {
        let _ = layout::remove_tree(&staging);
        return Err(e);
    }
    rename(&staging, &cached)?;
    Ok(cached)
}

impl Sealed for DirStorage {}

#[async_trait]
impl Storage for DirStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::Dir
    }

    fn container_path(&self, name: &ContainerName) -> PathBuf {
        self.layout.container_path(name)
    }

    async fn container_create(&self, name: &ContainerName) -> Result<(), StorageError> {
        let path = self.container_path(name);
        let name = name.clone();
        blocking(move || {
            ensure_absent(&path, &name)?;
            let rootfs = path.join("rootfs");
            fs::create_dir_all(&rootfs).map_err(|e| StorageError::io(&rootfs, e))
        })
        .await
    }

    async fn container_create_from_image(
        &self,
        name: &ContainerName,
        fingerprint: &ImageId,
    ) -> Result<(), StorageError> {
        let layout = self.layout.clone();
        let path = self.container_path(name);
        let name = name.clone();
        let fingerprint = fingerprint.clone();
        blocking(move || {
            ensure_absent(&path, &name)?;
            unpack_image(&layout, &fingerprint)?;
            let source = layout.image_rootfs(&fingerprint);
            let rootfs = path.join("rootfs");
            if let Err(e) = layout::copy_tree(&source, &rootfs) {
                let _ = layout::remove_tree(&path);
                return Err(e);
            }
            Ok(())
        })
        .await
    }

    async fn container_delete(&self, name: &ContainerName) -> Result<(), StorageError> {
        let path = self.container_path(name);
        let snapshots = (!name.is_snapshot()).then(|| self.layout.snapshots_dir(name));
        blocking(move || {
            layout::remove_tree(&path)?;
            if let Some(snapshots) = snapshots {
                layout::remove_tree(&snapshots)?;
            }
            Ok(())
        })
        .await
    }

    async fn container_copy(
        &self,
        name: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError> {
        let from = self.container_path(source);
        let to = self.container_path(name);
        let (name, source) = (name.clone(), source.clone());
        blocking(move || {
            ensure_present(&from, &source)?;
            ensure_absent(&to, &name)?;
            create_parent(&to)?;
            if let Err(e) = layout::copy_tree(&from, &to) {
                let _ = layout::remove_tree(&to);
                return Err(e);
            }
            Ok(())
        })
        .await
    }

    async fn container_start(&self, name: &ContainerName) -> Result<(), StorageError> {
        let path = self.container_path(name);
        let name = name.clone();
        blocking(move || ensure_present(&path, &name)).await
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
        let snapshots = self.layout.snapshots_dir(name);
        let new_snapshots = self.layout.snapshots_dir(new_name);
        let (name, new_name) = (name.clone(), new_name.clone());
        blocking(move || {
            ensure_present(&from, &name)?;
            ensure_absent(&to, &new_name)?;
            rename(&from, &to)?;
            if snapshots.exists() {
                ensure_absent(&new_snapshots, &new_name)?;
                rename(&snapshots, &new_snapshots)?;
            }
            Ok(())
        })
        .await
    }

    async fn container_restore(
        &self,
        name: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError> {
        let target = self.container_path(name);
        let from = self.container_path(source);
        let source = source.clone();
        blocking(move || {
            ensure_present(&from, &source)?;
            let staging = target.with_extension("restoring");
            layout::remove_tree(&staging)?;
            if let Err(e) = layout::copy_tree(&from, &staging) {
                let _ = layout::remove_tree(&staging);
                return Err(e);
            }
            layout::remove_tree(&target)?;
            rename(&staging, &target)
        })
        .await
    }

    async fn container_snapshot_create(
        &self,
        snapshot: &ContainerName,
        source: &ContainerName,
    ) -> Result<(), StorageError> {
        self.container_copy(snapshot, source).await
    }

    async fn container_snapshot_delete(&self, snapshot: &ContainerName) -> Result<(), StorageError> {
        let path = self.container_path(snapshot);
        blocking(move || layout::remove_tree(&path)).await
    }

    async fn container_snapshot_rename(
        &self,
        snapshot: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), StorageError> {
        let from = self.container_path(snapshot);
        let to = self.container_path(new_name);
        let (snapshot, new_name) = (snapshot.clone(), new_name.clone());
        blocking(move || {
            ensure_present(&from, &snapshot)?;
            ensure_absent(&to, &new_name)?;
            create_parent(&to)?;
            rename(&from, &to)
        })
        .await
    }

    async fn image_create(&self, fingerprint: &ImageId) -> Result<(), StorageError> {
        let layout = self.layout.clone();
        let fingerprint = fingerprint.clone();
        blocking(move || unpack_image(&layout, &fingerprint).map(|_| ())).await
    }

    async fn image_delete(&self, fingerprint: &ImageId) -> Result<(), StorageError> {
        let path = self.layout.image_path(fingerprint);
        blocking(move || layout::remove_tree(&path)).await
    }
}
