//! Durable storage for Compass.
//!
//! Provides a minimal key-value persistence seam and, on top of it, the
//! durable log of mutations that were made while offline.
//!
//! # Architecture
//!
//! - `KeyValueStore` is the only thing the log needs from the platform:
//!   `get`/`set`/`remove` of one blob under a fixed key.
//! - `MemoryStore` keeps blobs in process memory; `SqliteStore` keeps them in
//!   a single-table SQLite file.
//! - `ActionLog` serializes the pending actions as one JSON array and mirrors
//!   it in memory. Every mutation writes first and only then updates the
//!   in-memory view, so the two never diverge.

mod action_log;
mod error;
pub mod kv;
mod sqlite;

pub use action_log::{ActionLog, PassCommit};
pub use error::{StorageError, StorageResult};
pub use kv::{KeyValueStore, MemoryStore};
pub use sqlite::SqliteStore;
