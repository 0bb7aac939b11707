// ABOUTME: Datastore wrapper that reports contention on demand.
// ABOUTME: Delegates to a real JSON datastore once the injected failures are used up.

use async_trait::async_trait;
use quayd::db::{ContainerKind, ContainerRecord, Datastore, DbError, JsonDatastore};
use quayd::types::ContainerName;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

pub struct FlakyDatastore {
    inner: JsonDatastore,
    locked_lists: AtomicU32,
    list_calls: AtomicU32,
}

impl FlakyDatastore {
    pub fn open(path: &Path) -> Self {
        Self {
            inner: JsonDatastore::open(path).unwrap(),
            locked_lists: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
        }
    }

    /// Make the next `n` container listings fail with `DbError::Locked`.
    pub fn lock_next_lists(&self, n: u32) {
        self.locked_lists.store(n, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Datastore for FlakyDatastore {
    async fn list_containers(&self, kind: ContainerKind) -> Result<Vec<ContainerName>, DbError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let locked = self
            .locked_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if locked {
            return Err(DbError::Locked);
        }
        self.inner.list_containers(kind).await
    }

    async fn list_snapshots(&self, parent: &ContainerName) -> Result<Vec<ContainerName>, DbError> {
        self.inner.list_snapshots(parent).await
    }

    async fn get_container(&self, name: &ContainerName) -> Result<ContainerRecord, DbError> {
        self.inner.get_container(name).await
    }

    async fn insert_container(&self, record: ContainerRecord) -> Result<(), DbError> {
        self.inner.insert_container(record).await
    }

    async fn remove_container(&self, name: &ContainerName) -> Result<(), DbError> {
        self.inner.remove_container(name).await
    }

    async fn rename_container(
        &self,
        name: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), DbError> {
        self.inner.rename_container(name, new_name).await
    }
}
