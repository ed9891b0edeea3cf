//! Configuration for the offline queue.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// Storage key the action log is written under by default.
pub const DEFAULT_STORAGE_KEY: &str = "compass.offline_actions";

/// Tunables for the sync coordinator and the offline facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Failed attempts after which a retryable action is dropped.
    pub max_attempts: u32,
    /// Key under which the action log is persisted.
    pub storage_key: String,
    /// Prefix of the provisional ids handed out for offline creates.
    pub temp_id_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            temp_id_prefix: "temp-".to_string(),
        }
    }
}

impl SyncConfig {
    /// Parses a JSON config; missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values can actually be used.
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_attempts == 0 {
            return Err(SyncError::Config("max_attempts must be at least 1".into()));
        }
        if self.storage_key.is_empty() {
            return Err(SyncError::Config("storage_key must not be empty".into()));
        }
        if self.temp_id_prefix.is_empty() {
            return Err(SyncError::Config("temp_id_prefix must not be empty".into()));
        }
        Ok(())
    }
}
