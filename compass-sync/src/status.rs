//! Observable sync status and drain pass results.

use crate::connectivity::Connectivity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide view of the offline queue. Never persisted: it is rebuilt
/// from the durable log and live connectivity at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Mirrors the connectivity monitor.
    pub connectivity: Connectivity,
    /// True while a drain pass is running.
    pub draining: bool,
    /// Number of actions in the durable log.
    pub pending_count: usize,
    /// When the last drain pass finished.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Failures from the most recent drain pass, in order.
    pub last_errors: Vec<String>,
}

impl SyncStatus {
    /// Creates the start-up status.
    pub fn new(connectivity: Connectivity, pending_count: usize) -> Self {
        Self {
            connectivity,
            draining: false,
            pending_count,
            last_synced_at: None,
            last_errors: Vec::new(),
        }
    }

    /// Returns true when no pass is running.
    pub fn is_idle(&self) -> bool {
        !self.draining
    }

    /// Returns true if the last pass reported failures.
    pub fn has_errors(&self) -> bool {
        !self.last_errors.is_empty()
    }

    /// Text for an unobtrusive "changes could not be saved" indicator.
    pub fn summary(&self) -> Option<String> {
        match self.last_errors.len() {
            0 => None,
            1 => Some("1 change could not be saved".to_string()),
            n => Some(format!("{n} changes could not be saved")),
        }
    }
}

/// Counts from one completed drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions confirmed by the remote store.
    pub succeeded: usize,
    /// Actions the store refused, dropped.
    pub rejected: usize,
    /// Actions dropped after their last allowed attempt.
    pub exhausted: usize,
    /// Actions that failed but stay queued for another pass.
    pub retried: usize,
    /// Whether the pass results reached durable storage.
    pub persisted: bool,
}

impl DrainReport {
    /// Number of actions the pass executed.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.rejected + self.exhausted + self.retried
    }
}

/// Why a drain request did not start a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyDraining,
}

/// Result of asking the coordinator to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    Skipped(SkipReason),
}

impl DrainOutcome {
    /// Returns the report if a pass ran.
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Skipped(_) => None,
        }
    }
}
