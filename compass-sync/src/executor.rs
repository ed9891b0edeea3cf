//! Mutation executor. Performs one queued action against the remote store.
//!
//! Touches nothing but the remote store: the action log and the sync status
//! belong to the coordinator.

use crate::remote::{RemoteError, RemoteStore};
use compass_types::{Mutation, QueuedAction, Record};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why executing an action failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Network trouble, a timeout or expired credentials; retrying may
    /// succeed.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The store refused the operation; retrying will not help.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Unclassified failure, retried like a transient one.
    #[error("unknown failure: {0}")]
    Unknown(String),
}

impl ExecutionError {
    /// Returns true if the action may be attempted again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

impl From<RemoteError> for ExecutionError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Network(_)
            | RemoteError::Timeout
            | RemoteError::Unavailable { .. }
            | RemoteError::Unauthorized { .. } => Self::Transient(e.to_string()),
            RemoteError::Rejected { .. } | RemoteError::NotFound(_) => Self::Rejected(e.to_string()),
            RemoteError::Other(_) => Self::Unknown(e.to_string()),
        }
    }
}

/// Executes queued actions against a remote store.
#[derive(Clone)]
pub struct MutationExecutor {
    remote: Arc<dyn RemoteStore>,
}

impl MutationExecutor {
    /// Creates an executor over `remote`.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Performs the remote call for `action`.
    ///
    /// Returns the row the store reported for creates and updates, `None`
    /// for deletes.
    pub async fn execute(&self, action: &QueuedAction) -> Result<Option<Record>, ExecutionError> {
        debug!("Executing {}", action.describe());
        let result = match &action.mutation {
            Mutation::Create { record, .. } => self.remote.insert(&action.target, record).await.map(Some),
            Mutation::Update { record_id, changes } => self
                .remote
                .update(&action.target, record_id, changes)
                .await
                .map(Some),
            Mutation::Delete { record_id } => {
                self.remote.delete(&action.target, record_id).await.map(|_| None)
            }
        };
        result.map_err(ExecutionError::from)
    }
}
