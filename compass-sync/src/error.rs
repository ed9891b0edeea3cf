//! Error types for the sync layer.

use crate::executor::ExecutionError;
use compass_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can reach a caller of the sync layer.
///
/// Failures inside a queued drain pass never surface here; they are reported
/// through `SyncStatus::last_errors`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The durable action log could not be read or written.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// An online mutation failed at the remote store.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
