// ABOUTME: Per-container lock registry serializing lifecycle transitions.
// ABOUTME: Also records the transitional state of the verb in flight for state rendering.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::status::StatusCode;
use crate::types::ContainerName;

/// Information about the verb holding a container lock.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// Container being transitioned.
    pub container: ContainerName,
    /// Transitional state reported while the verb runs.
    pub transition: Option<StatusCode>,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
}

#[derive(Default)]
struct Entry {
    mutex: Arc<tokio::sync::Mutex<()>>,
    info: Mutex<Option<LockInfo>>,
}

/// Locks keyed by container name. Different containers never contend.
#[derive(Default)]
pub struct LockRegistry {
    entries: Mutex<HashMap<ContainerName, Arc<Entry>>>,
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    ///
    /// Snapshots share their parent's lock.
    pub async fn acquire(self: &Arc<Self>, name: &ContainerName) -> ContainerLock {
        let key = name.parent();
        let entry = self
            .entries
            .lock()
            .entry(key.clone())
            .or_default()
            .clone();

        let guard = entry.mutex.clone().lock_owned().await;
        *entry.info.lock() = Some(LockInfo {
            container: key.clone(),
            transition: None,
            acquired_at: Utc::now(),
        });

        ContainerLock {
            registry: Arc::clone(self),
            key,
            entry,
            guard: Some(guard),
        }
    }

    /// Holder of the lock on `name`, if any.
    pub fn holder(&self, name: &ContainerName) -> Option<LockInfo> {
        let entries = self.entries.lock();
        entries.get(&name.parent())?.info.lock().clone()
    }

    /// Transitional state of the verb in flight on `name`, if any.
    pub fn transition(&self, name: &ContainerName) -> Option<StatusCode> {
        self.holder(name).and_then(|info| info.transition)
    }
}

/// A held container lock; released on drop.
pub struct ContainerLock {
    registry: Arc<LockRegistry>,
    key: ContainerName,
    entry: Arc<Entry>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for ContainerLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerLock")
            .field("container", &self.key)
            .finish()
    }
}

impl ContainerLock {
    /// Report `status` as the container's state until the lock is released
    /// or the transition changes.
    pub fn set_transition(&self, status: StatusCode) {
        if let Some(info) = self.entry.info.lock().as_mut() {
            info.transition = Some(status);
        }
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        *self.entry.info.lock() = None;
        self.guard.take();

        // Drop the entry unless someone else is queued on it.
        let mut entries = self.registry.entries.lock();
        if Arc::strong_count(&self.entry) == 2 {
            entries.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(s: &str) -> ContainerName {
        ContainerName::new(s).unwrap()
    }

    #[tokio::test]
    async fn transition_is_visible_while_held() {
        let registry = Arc::new(LockRegistry::new());
        let lock = registry.acquire(&name("web")).await;
        lock.set_transition(StatusCode::Starting);

        assert_eq!(registry.transition(&name("web")), Some(StatusCode::Starting));
        drop(lock);
        assert_eq!(registry.transition(&name("web")), None);
    }

    #[tokio::test]
    async fn same_container_is_serialized() {
        let registry = Arc::new(LockRegistry::new());
        let first = registry.acquire(&name("web")).await;

        let second = tokio::time::timeout(
            Duration::from_millis(50),
            registry.acquire(&name("web/snap0")),
        )
        .await;
        assert!(second.is_err(), "snapshot shares the parent's lock");

        let other = tokio::time::timeout(Duration::from_millis(50), registry.acquire(&name("db")))
            .await;
        assert!(other.is_ok(), "unrelated containers do not contend");
        drop(first);
    }
}
