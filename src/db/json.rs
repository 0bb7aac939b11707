// ABOUTME: Datastore persisted as a single JSON document.
// ABOUTME: Writes replace the file atomically; lock contention surfaces as DbError::Locked.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::{ContainerKind, ContainerRecord, Datastore, DbError};
use crate::types::ContainerName;

/// How long a caller waits for the store before reporting contention.
const LOCK_TIMEOUT: Duration = Duration::from_millis(50);

type Records = BTreeMap<String, ContainerRecord>;

pub struct JsonDatastore {
    path: PathBuf,
    records: Mutex<Records>,
}

impl std::fmt::Debug for JsonDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDatastore")
            .field("path", &self.path)
            .finish()
    }
}

impl JsonDatastore {
    /// Open the store at `path`, creating an empty one if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => {
                let list: Vec<ContainerRecord> = serde_json::from_slice(&bytes)?;
                list.into_iter()
                    .map(|r| (r.name.as_str().to_string(), r))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Records::new(),
            Err(source) => return Err(DbError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), records = records.len(), "datastore opened");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Records>, DbError> {
        tokio::time::timeout(LOCK_TIMEOUT, self.records.lock())
            .await
            .map_err(|_| DbError::Locked)
    }

    async fn read<T>(&self, f: impl FnOnce(&Records) -> Result<T, DbError>) -> Result<T, DbError> {
        let guard = self.lock().await?;
        f(&guard)
    }

    /// Apply `f` to a copy of the records and commit it only if persisting succeeds.
    async fn write(
        &self,
        f: impl FnOnce(&mut Records) -> Result<(), DbError>,
    ) -> Result<(), DbError> {
        let mut guard = self.lock().await?;
        let mut next = guard.clone();
        f(&mut next)?;
        persist(&self.path, &next).await?;
        *guard = next;
        Ok(())
    }
}

async fn persist(path: &Path, records: &Records) -> Result<(), DbError> {
    let io_err = |source| DbError::Io {
        path: path.to_path_buf(),
        source,
    };
    let list: Vec<&ContainerRecord> = records.values().collect();
    let bytes = serde_json::to_vec_pretty(&list)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[async_trait]
impl Datastore for JsonDatastore {
    async fn list_containers(&self, kind: ContainerKind) -> Result<Vec<ContainerName>, DbError> {
        self.read(|records| {
            Ok(records
                .values()
                .filter(|r| r.kind == kind)
                .map(|r| r.name.clone())
                .collect())
        })
        .await
    }

    async fn list_snapshots(&self, parent: &ContainerName) -> Result<Vec<ContainerName>, DbError> {
        self.read(|records| {
            let mut snaps: Vec<&ContainerRecord> = records
                .values()
                .filter(|r| r.kind == ContainerKind::Snapshot && r.name.parent() == *parent)
                .collect();
            snaps.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
            Ok(snaps.into_iter().map(|r| r.name.clone()).collect())
        })
        .await
    }

    async fn get_container(&self, name: &ContainerName) -> Result<ContainerRecord, DbError> {
        self.read(|records| {
            records
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| DbError::container_not_found(name))
        })
        .await
    }

    async fn insert_container(&self, record: ContainerRecord) -> Result<(), DbError> {
        self.write(|records| {
            let key = record.name.as_str().to_string();
            if records.contains_key(&key) {
                return Err(DbError::AlreadyDefined {
                    kind: "container",
                    name: key,
                });
            }
            records.insert(key, record);
            Ok(())
        })
        .await
    }

    async fn remove_container(&self, name: &ContainerName) -> Result<(), DbError> {
        self.write(|records| {
            if records.remove(name.as_str()).is_none() {
                return Err(DbError::container_not_found(name));
            }
            if !name.is_snapshot() {
                records.retain(|_, r| !(r.kind == ContainerKind::Snapshot && r.name.parent() == *name));
            }
            Ok(())
        })
        .await
    }

    async fn rename_container(
        &self,
        name: &ContainerName,
        new_name: &ContainerName,
    ) -> Result<(), DbError> {
        self.write(|records| {
            if records.contains_key(new_name.as_str()) {
                return Err(DbError::AlreadyDefined {
                    kind: "container",
                    name: new_name.to_string(),
                });
            }
            let mut record = records
                .remove(name.as_str())
                .ok_or_else(|| DbError::container_not_found(name))?;
            record.name = new_name.clone();
            records.insert(new_name.as_str().to_string(), record);

            if name.is_snapshot() {
                return Ok(());
            }

            let snapshots: Vec<String> = records
                .values()
                .filter(|r| r.kind == ContainerKind::Snapshot && r.name.parent() == *name)
                .map(|r| r.name.as_str().to_string())
                .collect();
            for key in snapshots {
                if let Some(mut snap) = records.remove(&key) {
                    let snap_name = snap.name.snapshot_name().unwrap_or_default().to_string();
                    snap.name = new_name
                        .snapshot(&snap_name)
                        .map_err(|e| DbError::Io {
                            path: PathBuf::from(&key),
                            source: std::io::Error::other(e.to_string()),
                        })?;
                    records.insert(snap.name.as_str().to_string(), snap);
                }
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ContainerName {
        ContainerName::new(s).unwrap()
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quayd.json");

        let db = JsonDatastore::open(&path).unwrap();
        db.insert_container(ContainerRecord::new(name("web"), None))
            .await
            .unwrap();
        drop(db);

        let db = JsonDatastore::open(&path).unwrap();
        assert!(db.container_exists(&name("web")).await.unwrap());
    }

    #[tokio::test]
    async fn rename_carries_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let db = JsonDatastore::open(dir.path().join("quayd.json")).unwrap();
        db.insert_container(ContainerRecord::new(name("web"), None))
            .await
            .unwrap();
        db.insert_container(ContainerRecord::new(name("web/snap0"), None))
            .await
            .unwrap();

        db.rename_container(&name("web"), &name("api")).await.unwrap();

        assert_eq!(
            db.list_snapshots(&name("api")).await.unwrap(),
            vec![name("api/snap0")]
        );
        assert!(!db.container_exists(&name("web/snap0")).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_is_already_defined() {
        let dir = tempfile::tempdir().unwrap();
        let db = JsonDatastore::open(dir.path().join("quayd.json")).unwrap();
        db.insert_container(ContainerRecord::new(name("web"), None))
            .await
            .unwrap();
        let err = db
            .insert_container(ContainerRecord::new(name("web"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::AlreadyDefined { .. }));
    }

    #[tokio::test]
    async fn held_lock_reports_contention() {
        let dir = tempfile::tempdir().unwrap();
        let db = JsonDatastore::open(dir.path().join("quayd.json")).unwrap();

        let guard = db.records.lock().await;
        let err = db.get_container(&name("web")).await.unwrap_err();
        assert!(matches!(err, DbError::Locked));
        drop(guard);

        assert!(!db.container_exists(&name("web")).await.unwrap());
    }
}
