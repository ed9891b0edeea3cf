//! Offline-first mutation queue for Compass.
//!
//! Lets the client create, update and delete remote rows while connectivity
//! comes and goes. Mutations made offline are persisted and replayed once the
//! device is back online, with bounded retries.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Connectivity**: tracks online/offline and fires once per transition
//! - **Action log** (`compass-storage`): durable FIFO of pending mutations
//! - **Executor**: performs one queued mutation against the remote store
//! - **Coordinator**: drains the log through the executor, applies the
//!   retry/drop policy and publishes `SyncStatus`
//! - **Facade**: decides per call whether to execute now or queue
//!
//! ## Drain pass
//!
//! 1. **Snapshot**: read the log in enqueue order
//! 2. **Execute**: run every action, continuing past failures
//! 3. **Classify**: drop successes and rejections, count a failed attempt
//!    for transient errors and drop actions out of attempts
//! 4. **Commit**: write the survivors back in a single write
//!
//! # Example
//!
//! ```no_run
//! use compass_storage::SqliteStore;
//! use compass_sync::{
//!     ConnectivityMonitor, OfflineFirst, RestRemoteStore, RestStoreConfig, SyncConfig,
//!     SyncCoordinator,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open("compass.db")?);
//! let remote = Arc::new(RestRemoteStore::new(RestStoreConfig::default())?);
//! let monitor = Arc::new(ConnectivityMonitor::from_signal(None));
//!
//! let coordinator = SyncCoordinator::open(SyncConfig::default(), store, remote, monitor).await?;
//! coordinator.spawn();
//! let app = OfflineFirst::new(coordinator);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

mod config;
mod connectivity;
mod coordinator;
mod error;
mod executor;
mod facade;
pub mod remote;
mod rest;
mod status;

pub use config::{SyncConfig, DEFAULT_STORAGE_KEY};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use executor::{ExecutionError, MutationExecutor};
pub use facade::{MutationResult, OfflineFirst};
pub use remote::{RemoteError, RemoteResult, RemoteStore};
pub use rest::{RestRemoteStore, RestStoreConfig};
pub use status::{DrainOutcome, DrainReport, SkipReason, SyncStatus};
