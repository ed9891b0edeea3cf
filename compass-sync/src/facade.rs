//! Offline-first entry point for create/update/delete.
//!
//! Online calls go straight to the remote store and report its real result
//! (or error). Offline calls are queued durably and answered with a
//! provisional result.

use crate::connectivity::Connectivity;
use crate::coordinator::SyncCoordinator;
use crate::error::SyncResult;
use crate::status::{DrainOutcome, SyncStatus};
use compass_types::{ActionId, QueuedAction, Record};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// What a facade call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    /// The remote store performed the mutation. Carries the stored row, if
    /// the store returned one.
    Confirmed(Option<Record>),
    /// The mutation was queued. `record` is synthesized locally and must not
    /// be treated as stored data; for creates its `id` is temporary.
    Provisional { action_id: ActionId, record: Record },
}

impl MutationResult {
    /// Returns the confirmed or provisional record.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Confirmed(record) => record.as_ref(),
            Self::Provisional { record, .. } => Some(record),
        }
    }

    /// Returns true if the mutation is only queued.
    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional { .. })
    }
}

/// The API the rest of the application uses for remote mutations.
#[derive(Clone)]
pub struct OfflineFirst {
    coordinator: Arc<SyncCoordinator>,
}

impl OfflineFirst {
    /// Creates a facade over `coordinator`.
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Inserts `record` into `target`.
    pub async fn create_offline(&self, target: &str, record: Record) -> SyncResult<MutationResult> {
        if self.is_online() {
            let action = QueuedAction::create(target, record, None);
            return self.execute_now(&action).await;
        }

        let temp_id = format!("{}{}", self.coordinator.config().temp_id_prefix, Uuid::new_v4());
        let mut provisional = record.clone();
        provisional.insert("id".into(), temp_id.clone().into());
        self.enqueue(QueuedAction::create(target, record, Some(temp_id)), provisional)
            .await
    }

    /// Applies `changes` to row `id` of `target`.
    pub async fn update_offline(
        &self,
        target: &str,
        id: &str,
        changes: Record,
    ) -> SyncResult<MutationResult> {
        let action = QueuedAction::update(target, id, changes.clone());
        if self.is_online() {
            return self.execute_now(&action).await;
        }

        let mut provisional = changes;
        provisional.insert("id".into(), id.into());
        self.enqueue(action, provisional).await
    }

    /// Deletes row `id` of `target`.
    pub async fn delete_offline(&self, target: &str, id: &str) -> SyncResult<MutationResult> {
        let action = QueuedAction::delete(target, id);
        if self.is_online() {
            return self.execute_now(&action).await;
        }

        let mut provisional = Record::new();
        provisional.insert("id".into(), id.into());
        self.enqueue(action, provisional).await
    }

    /// Drains the queue now; a no-op when offline or already draining.
    pub async fn force_sync(&self) -> DrainOutcome {
        self.coordinator.force_sync().await
    }

    /// Subscribes to status changes.
    pub fn observe_sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.coordinator.observe()
    }

    /// Returns a snapshot of the status.
    pub fn sync_status(&self) -> SyncStatus {
        self.coordinator.status()
    }

    /// Discards every unsynced change. Returns how many were dropped.
    pub async fn clear_all_pending(&self) -> SyncResult<usize> {
        self.coordinator.clear_all_pending().await
    }

    /// See [`SyncCoordinator::on_reconciled`].
    pub fn on_reconciled<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.coordinator.on_reconciled(callback);
    }

    fn is_online(&self) -> bool {
        self.coordinator.connectivity() == Connectivity::Online
    }

    async fn execute_now(&self, action: &QueuedAction) -> SyncResult<MutationResult> {
        let confirmed = self.coordinator.executor().execute(action).await?;
        Ok(MutationResult::Confirmed(confirmed))
    }

    async fn enqueue(&self, action: QueuedAction, record: Record) -> SyncResult<MutationResult> {
        let action_id = action.id;
        debug!("Offline, queueing {}", action.describe());
        self.coordinator.enqueue(action).await?;
        Ok(MutationResult::Provisional { action_id, record })
    }
}
