//! Remote row store abstraction.
//!
//! The backend is a row-oriented store addressed by table name and row id.
//! Implementations report failures as [`RemoteError`]s precise enough for the
//! executor to tell retryable failures from permanent ones.

use async_trait::async_trait;
use compass_types::Record;
use thiserror::Error;

/// Result type for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures reported by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never got a response (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The store answered but is temporarily unable to serve
    /// (overload, rate limit, 5xx).
    #[error("store unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// The credentials were refused. Retryable once the access token has
    /// been refreshed.
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// The store refused the operation (validation, constraint).
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The targeted row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything the transport could not classify.
    #[error("{0}")]
    Other(String),
}

/// A remote row store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts a record and returns the stored row.
    async fn insert(&self, table: &str, record: &Record) -> RemoteResult<Record>;

    /// Applies a partial update to one row and returns the stored row.
    async fn update(&self, table: &str, id: &str, changes: &Record) -> RemoteResult<Record>;

    /// Deletes one row.
    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()>;
}

/// An in-memory remote store for testing.
pub mod mock {
    use super::*;
    use compass_types::ActionKind;
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    /// One call received by the mock.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RemoteCall {
        pub kind: ActionKind,
        pub table: String,
        pub record_id: Option<String>,
        pub record: Option<Record>,
    }

    type Matcher = Box<dyn Fn(&RemoteCall) -> bool + Send + Sync>;

    /// Keeps rows per table and records every call. Failures can be
    /// scripted once ([`fail_next`](Self::fail_next)) or persistently
    /// ([`fail_when`](Self::fail_when)).
    #[derive(Default)]
    pub struct MockRemoteStore {
        tables: Mutex<HashMap<String, BTreeMap<String, Record>>>,
        calls: Mutex<Vec<RemoteCall>>,
        rules: Mutex<Vec<(Matcher, RemoteError)>>,
        queued_failures: Mutex<VecDeque<RemoteError>>,
        latency: Mutex<Option<Duration>>,
        next_id: AtomicU64,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    impl MockRemoteStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts a row directly, bypassing call recording.
        pub fn seed(&self, table: &str, id: &str, mut record: Record) {
            record.insert("id".into(), id.into());
            lock(&self.tables)
                .entry(table.to_string())
                .or_default()
                .insert(id.to_string(), record);
        }

        /// Returns the rows of a table ordered by id.
        pub fn rows(&self, table: &str) -> Vec<Record> {
            lock(&self.tables)
                .get(table)
                .map(|t| t.values().cloned().collect())
                .unwrap_or_default()
        }

        /// Returns one row.
        pub fn row(&self, table: &str, id: &str) -> Option<Record> {
            lock(&self.tables).get(table).and_then(|t| t.get(id).cloned())
        }

        /// Returns every call received so far, in order.
        pub fn calls(&self) -> Vec<RemoteCall> {
            lock(&self.calls).clone()
        }

        /// Makes the next call fail with `error`.
        pub fn fail_next(&self, error: RemoteError) {
            lock(&self.queued_failures).push_back(error);
        }

        /// Makes every call matching `matcher` fail with `error`.
        pub fn fail_when<F>(&self, matcher: F, error: RemoteError)
        where
            F: Fn(&RemoteCall) -> bool + Send + Sync + 'static,
        {
            lock(&self.rules).push((Box::new(matcher), error));
        }

        /// Removes all persistent failure rules.
        pub fn clear_failures(&self) {
            lock(&self.rules).clear();
            lock(&self.queued_failures).clear();
        }

        /// Delays every call by `latency`.
        pub fn set_latency(&self, latency: Duration) {
            *lock(&self.latency) = Some(latency);
        }

        async fn begin(&self, call: RemoteCall) -> RemoteResult<()> {
            let latency = *lock(&self.latency);
            if let Some(d) = latency {
                tokio::time::sleep(d).await;
            }
            let scripted = lock(&self.queued_failures).pop_front();
            let ruled = lock(&self.rules)
                .iter()
                .find(|(m, _)| m(&call))
                .map(|(_, e)| e.clone());
            lock(&self.calls).push(call);
            match scripted.or(ruled) {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemoteStore {
        async fn insert(&self, table: &str, record: &Record) -> RemoteResult<Record> {
            self.begin(RemoteCall {
                kind: ActionKind::Create,
                table: table.to_string(),
                record_id: None,
                record: Some(record.clone()),
            })
            .await?;

            let id = match record.get("id") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => format!("row-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            };
            let mut stored = record.clone();
            stored.insert("id".into(), id.clone().into());
            lock(&self.tables)
                .entry(table.to_string())
                .or_default()
                .insert(id, stored.clone());
            Ok(stored)
        }

        async fn update(&self, table: &str, id: &str, changes: &Record) -> RemoteResult<Record> {
            self.begin(RemoteCall {
                kind: ActionKind::Update,
                table: table.to_string(),
                record_id: Some(id.to_string()),
                record: Some(changes.clone()),
            })
            .await?;

            let mut tables = lock(&self.tables);
            let row = tables
                .get_mut(table)
                .and_then(|t| t.get_mut(id))
                .ok_or_else(|| RemoteError::NotFound(format!("{table}/{id}")))?;
            for (k, v) in changes {
                row.insert(k.clone(), v.clone());
            }
            Ok(row.clone())
        }

        async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
            self.begin(RemoteCall {
                kind: ActionKind::Delete,
                table: table.to_string(),
                record_id: Some(id.to_string()),
                record: None,
            })
            .await?;

            lock(&self.tables)
                .get_mut(table)
                .and_then(|t| t.remove(id))
                .map(|_| ())
                .ok_or_else(|| RemoteError::NotFound(format!("{table}/{id}")))
        }
    }
}
