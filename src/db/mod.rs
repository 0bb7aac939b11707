// ABOUTME: Narrow datastore contract for container records.
// ABOUTME: JSON-file implementation plus retry wrappers for transient lock errors.

mod error;
mod json;
pub mod retry;

pub use error::DbError;
pub use json::JsonDatastore;
pub use retry::{retry_read, retry_write};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContainerName, ImageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Regular,
    Snapshot,
}

/// Persisted identity of a container or snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: ContainerName,
    pub kind: ContainerKind,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageId>,
}

impl ContainerRecord {
    pub fn new(name: ContainerName, image: Option<ImageId>) -> Self {
        let kind = if name.is_snapshot() {
            ContainerKind::Snapshot
        } else {
            ContainerKind::Regular
        };
        Self {
            name,
            kind,
            created_at: Utc::now(),
            image,
        }
    }
}

/// Container record storage. Any call may fail with [`DbError::Locked`].
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Names of all records of the given kind, sorted by name.
    async fn list_containers(&self, kind: ContainerKind) -> Result<Vec<ContainerName>, DbError>;

    /// Snapshots of `parent`, oldest first.
    async fn list_snapshots(&self, parent: &ContainerName) -> Result<Vec<ContainerName>, DbError>;

    async fn get_container(&self, name: &ContainerName) -> Result<ContainerRecord, DbError>;

    async fn container_exists(&self, name: &ContainerName) -> Result<bool, DbError> {
        match self.get_container(name).await {
            Ok(_) => Ok(true),
            Err(DbError::NoRows { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fails with [`DbError::AlreadyDefined`] if the name is taken.
    async fn insert_container(&self, record: ContainerRecord) -> Result<(), DbError>;

    /// Remove a record; removing a regular container also removes its snapshots.
    async fn remove_container(&self, name: &ContainerName) -> Result<(), DbError>;

    /// Rename a record; renaming a regular container carries its snapshots along.
    async fn rename_container(
        &self,
        name: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), DbError>;
}
