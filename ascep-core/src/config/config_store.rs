//! Versioned runtime config with change notification.
//!
//! `ConfigStore<T>` keeps the live value behind a tokio `RwLock` and bumps
//! a version on every write. Consumers hold a [`ConfigWatcher`] and pick
//! up new values between units of work instead of polling.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, watch};

pub struct ConfigStore<T> {
    inner: Arc<ConfigStoreInner<T>>,
}

struct ConfigStoreInner<T> {
    data: RwLock<T>,
    version: AtomicU64,
    version_tx: watch::Sender<u64>,
}

/// Wakes when the owning [`ConfigStore`] is written.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(ConfigStoreInner {
                data: RwLock::new(initial),
                version: AtomicU64::new(0),
                version_tx,
            }),
        }
    }

    /// Replace the value and notify watchers.
    pub async fn update(&self, value: T) {
        let mut guard = self.inner.data.write().await;
        *guard = value;
        drop(guard);
        self.bump();
    }

    /// Derive the next value from the current one under the write lock.
    ///
    /// Nothing is stored and no watcher is woken when `f` fails.
    pub async fn try_update<E>(&self, f: impl FnOnce(&T) -> Result<T, E>) -> Result<(), E> {
        let mut guard = self.inner.data.write().await;
        *guard = f(&guard)?;
        drop(guard);
        self.bump();
        Ok(())
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.data.read().await
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }

    fn bump(&self) {
        let new_version = self.inner.version.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.inner.version_tx.send(new_version);
    }
}

impl<T: Clone> ConfigStore<T> {
    pub async fn snapshot(&self) -> T {
        self.inner.data.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait for the next write. Errors once the store is dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watcher_sees_updates() {
        let store = ConfigStore::new(1u32);
        let mut watcher = store.subscribe();

        store.update(2).await;
        watcher.changed().await.unwrap();
        assert_eq!(store.snapshot().await, 2);
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_failed_try_update_changes_nothing() {
        let store = ConfigStore::new(10u32);
        let res: Result<(), &str> = store.try_update(|_| Err("nope")).await;
        assert_eq!(res, Err("nope"));
        assert_eq!(*store.read().await, 10);
        assert_eq!(store.version(), 0);

        store.try_update(|v| Ok::<_, ()>(v + 5)).await.unwrap();
        assert_eq!(*store.read().await, 15);
        assert_eq!(store.version(), 1);
    }
}
