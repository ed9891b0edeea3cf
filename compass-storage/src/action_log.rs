//! Durable, append-only log of pending mutations.
//!
//! The whole log is stored as one JSON array under a fixed key. The in-memory
//! copy is only updated after the backing store accepted the write.

use crate::error::StorageResult;
use crate::kv::KeyValueStore;
use compass_types::{ActionId, QueuedAction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Durable FIFO of actions that have not been confirmed yet.
pub struct ActionLog {
    store: Arc<dyn KeyValueStore>,
    key: String,
    entries: Mutex<Vec<QueuedAction>>,
}

impl ActionLog {
    /// Opens the log stored under `key`, loading whatever a previous process
    /// left behind.
    pub async fn open(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> StorageResult<Self> {
        let key = key.into();
        let entries = match store.get(&key).await? {
            Some(bytes) => QueuedAction::decode_list(&bytes)?,
            None => Vec::new(),
        };
        if !entries.is_empty() {
            debug!("Loaded {} pending actions from '{}'", entries.len(), key);
        }
        Ok(Self {
            store,
            key,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the storage key this log lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Appends an action. Durable once this returns `Ok`.
    pub async fn append(&self, action: QueuedAction) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        debug!("Appending {}", action.describe());
        next.push(action);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    /// Returns all pending actions in enqueue order.
    pub async fn list(&self) -> Vec<QueuedAction> {
        self.entries.lock().await.clone()
    }

    /// Number of pending actions.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Removes one action by id. Returns whether it was present; removing an
    /// absent id does nothing.
    pub async fn remove(&self, id: ActionId) -> StorageResult<bool> {
        let mut entries = self.entries.lock().await;
        if !entries.iter().any(|a| a.id == id) {
            return Ok(false);
        }
        let next: Vec<QueuedAction> = entries.iter().filter(|a| a.id != id).cloned().collect();
        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }

    /// Rewrites the whole log in one write.
    pub async fn replace_all(&self, actions: Vec<QueuedAction>) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;
        self.persist(&actions).await?;
        *entries = actions;
        Ok(())
    }

    /// Drops every pending action. Returns how many were discarded.
    pub async fn clear(&self) -> StorageResult<usize> {
        let mut entries = self.entries.lock().await;
        let discarded = entries.len();
        self.persist(&[]).await?;
        entries.clear();
        Ok(discarded)
    }

    /// Folds the results of a drain pass into the current log in one write.
    ///
    /// Actions the pass processed are replaced by their retained version or
    /// dropped. Actions appended after the pass took its snapshot keep their
    /// place, and actions removed meanwhile stay removed.
    /// Returns the new length.
    pub async fn commit_pass(&self, commit: &PassCommit) -> StorageResult<usize> {
        let mut entries = self.entries.lock().await;
        let next: Vec<QueuedAction> = entries
            .iter()
            .filter_map(|a| {
                if commit.processed.contains(&a.id) {
                    commit.kept.get(&a.id).cloned()
                } else {
                    Some(a.clone())
                }
            })
            .collect();
        self.persist(&next).await?;
        *entries = next;
        Ok(entries.len())
    }

    async fn persist(&self, actions: &[QueuedAction]) -> StorageResult<()> {
        let result = if actions.is_empty() {
            self.store.remove(&self.key).await
        } else {
            let bytes = QueuedAction::encode_list(actions)?;
            self.store.set(&self.key, &bytes).await
        };
        if let Err(e) = &result {
            warn!("Failed to persist action log '{}': {}", self.key, e);
        }
        result
    }
}

/// Per-action results of one drain pass, waiting to be written back.
#[derive(Debug, Clone, Default)]
pub struct PassCommit {
    processed: HashSet<ActionId>,
    kept: HashMap<ActionId, QueuedAction>,
}

impl PassCommit {
    /// Creates an empty commit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `action` was processed and should stay in the log in
    /// its updated form.
    pub fn keep(&mut self, action: QueuedAction) {
        self.processed.insert(action.id);
        self.kept.insert(action.id, action);
    }

    /// Records that the action was processed and should leave the log.
    pub fn discard(&mut self, id: ActionId) {
        self.processed.insert(id);
        self.kept.remove(&id);
    }

    /// Number of actions the pass processed.
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Number of processed actions that stay in the log.
    pub fn kept_count(&self) -> usize {
        self.kept.len()
    }

    /// Returns true if the pass processed nothing.
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
