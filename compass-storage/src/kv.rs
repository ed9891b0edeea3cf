//! Key-value persistence seam.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Persists opaque blobs under string keys.
///
/// `set` must be durable when it returns: callers assume the value survives
/// an immediate crash.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value in one step.
    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

/// In-process store. Clones share the same map, so a clone outlives a
/// "restart" of whatever was built on top of the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the raw value under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// A store wrapper for testing write failures.
pub mod mock {
    use super::*;
    use crate::error::StorageError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Wraps a [`MemoryStore`] and fails writes while switched on.
    #[derive(Debug, Clone, Default)]
    pub struct FlakyStore {
        inner: MemoryStore,
        fail_writes: Arc<AtomicBool>,
        writes: Arc<AtomicUsize>,
    }

    impl FlakyStore {
        /// Wraps an existing memory store.
        pub fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                ..Default::default()
            }
        }

        /// Makes subsequent `set`/`remove` calls fail (or succeed again).
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Number of successful writes so far.
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        /// The wrapped store.
        pub fn inner(&self) -> &MemoryStore {
            &self.inner
        }

        fn check(&self) -> StorageResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::WriteFailed("simulated write failure".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
            self.check()?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> StorageResult<()> {
            self.check()?;
            self.inner.remove(key).await
        }
    }
}
