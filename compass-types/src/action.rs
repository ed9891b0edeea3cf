//! Queued mutation intents.
//!
//! A `QueuedAction` serializes to
//! `{id, target, kind, payload, enqueuedAt, attempts}`, where the shape of
//! `payload` depends on `kind`.

use crate::ids::ActionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row as exchanged with the remote store: a JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The kind of remote mutation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Kind-dependent payload of a queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Mutation {
    /// Insert a full record.
    Create {
        record: Record,
        /// Provisional id handed to the caller while the insert was queued.
        #[serde(rename = "tempId", default, skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    /// Apply a partial set of field changes to an existing record.
    Update {
        #[serde(rename = "recordId")]
        record_id: String,
        changes: Record,
    },
    /// Delete an existing record.
    Delete {
        #[serde(rename = "recordId")]
        record_id: String,
    },
}

impl Mutation {
    /// Returns the kind of this mutation.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    /// Returns the id of the record this mutation targets, if it has one yet.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Update { record_id, .. } | Self::Delete { record_id } => Some(record_id),
        }
    }
}

/// One pending mutation intent, persisted until it is confirmed or dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Unique id assigned at enqueue time.
    pub id: ActionId,
    /// Remote table the action applies to.
    pub target: String,
    /// What to do, with its payload.
    #[serde(flatten)]
    pub mutation: Mutation,
    /// When the action was created.
    pub enqueued_at: DateTime<Utc>,
    /// Execution attempts made so far.
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedAction {
    /// Creates a fresh action with a new id, stamped now, with no attempts.
    pub fn new(target: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            id: ActionId::new(),
            target: target.into(),
            mutation,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Creates a queued insert.
    pub fn create(target: impl Into<String>, record: Record, temp_id: Option<String>) -> Self {
        Self::new(target, Mutation::Create { record, temp_id })
    }

    /// Creates a queued partial update.
    pub fn update(target: impl Into<String>, record_id: impl Into<String>, changes: Record) -> Self {
        Self::new(
            target,
            Mutation::Update {
                record_id: record_id.into(),
                changes,
            },
        )
    }

    /// Creates a queued delete.
    pub fn delete(target: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self::new(
            target,
            Mutation::Delete {
                record_id: record_id.into(),
            },
        )
    }

    /// Returns the kind of this action.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.mutation.kind()
    }

    /// Short human-readable label, e.g. `update posts/42 (0190...)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.mutation.record_id() {
            Some(rid) => format!("{} {}/{} ({})", self.kind(), self.target, rid, self.id),
            None => format!("{} {} ({})", self.kind(), self.target, self.id),
        }
    }

    /// Serializes a list of actions to the JSON array stored on disk.
    pub fn encode_list(actions: &[QueuedAction]) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(actions)?)
    }

    /// Parses a JSON array written by [`QueuedAction::encode_list`].
    pub fn decode_list(bytes: &[u8]) -> crate::Result<Vec<QueuedAction>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
