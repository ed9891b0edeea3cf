#![allow(dead_code)]

use compass_storage::kv::mock::FlakyStore;
use compass_storage::MemoryStore;
use compass_sync::remote::mock::MockRemoteStore;
use compass_sync::{Connectivity, ConnectivityMonitor, OfflineFirst, SyncConfig, SyncCoordinator};
use compass_types::Record;
use std::sync::{Arc, Once};

/// Routes `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Everything a test needs, wired the way an app would wire it.
pub struct Harness {
    pub storage: FlakyStore,
    pub remote: Arc<MockRemoteStore>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub coordinator: Arc<SyncCoordinator>,
    pub app: OfflineFirst,
}

impl Harness {
    /// Builds a harness on fresh storage.
    pub async fn new(initial: Connectivity) -> Self {
        Self::with_config(initial, SyncConfig::default()).await
    }

    pub async fn with_config(initial: Connectivity, config: SyncConfig) -> Self {
        init_tracing();
        let storage = FlakyStore::new(MemoryStore::new());
        let remote = Arc::new(MockRemoteStore::new());
        let monitor = Arc::new(ConnectivityMonitor::new(initial));
        Self::assemble(storage, remote, monitor, config).await
    }

    /// Simulates a process restart: fresh in-memory state over the same
    /// durable storage and remote store.
    pub async fn restart(&self, initial: Connectivity) -> Self {
        let monitor = Arc::new(ConnectivityMonitor::new(initial));
        Self::assemble(
            self.storage.clone(),
            self.remote.clone(),
            monitor,
            self.coordinator.config().clone(),
        )
        .await
    }

    async fn assemble(
        storage: FlakyStore,
        remote: Arc<MockRemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
        config: SyncConfig,
    ) -> Self {
        let coordinator = SyncCoordinator::open(
            config,
            Arc::new(storage.clone()),
            remote.clone(),
            monitor.clone(),
        )
        .await
        .unwrap();
        let app = OfflineFirst::new(coordinator.clone());
        Self {
            storage,
            remote,
            monitor,
            coordinator,
            app,
        }
    }

    pub fn go_online(&self) {
        self.monitor.set_state(Connectivity::Online);
    }

    pub fn go_offline(&self) {
        self.monitor.set_state(Connectivity::Offline);
    }
}

/// Builds a record from a JSON object literal.
pub fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().expect("record must be a JSON object")
}
