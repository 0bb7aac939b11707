// ABOUTME: No-op storage driver used by tests and dry runs.
// ABOUTME: Every call succeeds without touching the filesystem.

use async_trait::async_trait;
use std::path::PathBuf;

use super::sealed::Sealed;
use super::{Storage, StorageError, StorageType};
use crate::types::{ContainerName, ImageId};

#[derive(Debug, Clone)]
pub struct MockStorage {
    root: PathBuf,
}

impl MockStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl Sealed for MockStorage {}

#[async_trait]
impl Storage for MockStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::Mock
    }

    fn container_path(&self, name: &ContainerName) -> PathBuf {
        self.root.join(name.as_str())
    }

    async fn container_create(&self, _name: &ContainerName) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_create_from_image(
        &self,
        _name: &ContainerName,
        _fingerprint: &ImageId,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_delete(&self, _name: &ContainerName) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_copy(
        &self,
        _name: &ContainerName,
        _source: &ContainerName,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_start(&self, _name: &ContainerName) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_stop(&self, _name: &ContainerName) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_rename(
        &self,
        _name: &ContainerName,
        _new_name: &ContainerName,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_restore(
        &self,
        _name: &ContainerName,
        _source: &ContainerName,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_snapshot_create(
        &self,
        _snapshot: &ContainerName,
        _source: &ContainerName,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_snapshot_delete(&self, _snapshot: &ContainerName) -> Result<(), StorageError> {
        Ok(())
    }

    async fn container_snapshot_rename(
        &self,
        _snapshot: &ContainerName,
        _new_name: &ContainerName,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn image_create(&self, _fingerprint: &ImageId) -> Result<(), StorageError> {
        Ok(())
    }

    async fn image_delete(&self, _fingerprint: &ImageId) -> Result<(), StorageError> {
        Ok(())
    }
}
