//! Core type definitions for Compass.
//!
//! This crate defines the plain data shared by the storage and sync layers:
//! - Action identifiers (UUID v7, time-ordered)
//! - Queued mutation intents and their JSON wire shape
//! - The loosely-typed `Record` rows exchanged with the remote store
//!
//! Nothing here performs I/O.

mod action;
mod ids;

pub use action::{ActionKind, Mutation, QueuedAction, Record};
pub use ids::ActionId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
