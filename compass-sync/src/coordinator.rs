//! Sync coordinator: drains the durable action log whenever online.
//!
//! The coordinator is `Idle` or `Draining`. A pass snapshots the log, runs
//! every action through the executor in FIFO order, then writes the
//! survivors back in one step. At most one pass runs at a time; requests
//! made while a pass is running are ignored rather than queued.

use crate::config::SyncConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::SyncResult;
use crate::executor::MutationExecutor;
use crate::remote::RemoteStore;
use crate::status::{DrainOutcome, DrainReport, SkipReason, SyncStatus};
use chrono::Utc;
use compass_storage::{ActionLog, KeyValueStore, PassCommit};
use compass_types::{Mutation, QueuedAction, Record};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type ReconcileHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Orchestrates draining the action log through the executor.
pub struct SyncCoordinator {
    config: SyncConfig,
    log: Arc<ActionLog>,
    executor: MutationExecutor,
    monitor: Arc<ConnectivityMonitor>,
    status: Arc<watch::Sender<SyncStatus>>,
    draining: Arc<AtomicBool>,
    /// Results of a pass that could not be written back yet.
    deferred: Mutex<Option<PassCommit>>,
    reconcilers: Mutex<Vec<ReconcileHandler>>,
    /// Holds at most one pending wake-up for the background loop.
    triggers: Mutex<Option<mpsc::Receiver<()>>>,
}

impl SyncCoordinator {
    /// Opens the action log from `store` and builds a coordinator around it.
    pub async fn open(
        config: SyncConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> SyncResult<Arc<Self>> {
        config.validate()?;
        let log = Arc::new(ActionLog::open(store, config.storage_key.clone()).await?);
        Ok(Self::with_log(config, log, MutationExecutor::new(remote), monitor).await)
    }

    /// Builds a coordinator over an already opened log.
    ///
    /// Seeds the status from the log length and the monitor's current state
    /// and registers the transition handlers.
    pub async fn with_log(
        config: SyncConfig,
        log: Arc<ActionLog>,
        executor: MutationExecutor,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Arc<Self> {
        let pending = log.len().await;
        let connectivity = monitor.current_state();
        let (status, _) = watch::channel(SyncStatus::new(connectivity, pending));
        let status = Arc::new(status);
        let draining = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(1);

        {
            let status = status.clone();
            let draining = draining.clone();
            monitor.on_transition(Connectivity::Online, move |c| {
                status.send_modify(|s| s.connectivity = c);
                if draining.load(Ordering::Acquire) {
                    debug!("Back online while a pass is running, ignoring");
                } else if tx.try_send(()).is_err() {
                    debug!("Drain already requested");
                }
            });
        }
        {
            let status = status.clone();
            monitor.on_transition(Connectivity::Offline, move |c| {
                status.send_modify(|s| s.connectivity = c);
            });
        }

        info!("Sync coordinator ready: {} pending, {}", pending, connectivity);
        Arc::new(Self {
            config,
            log,
            executor,
            monitor,
            status,
            draining,
            deferred: Mutex::new(None),
            reconcilers: Mutex::new(Vec::new()),
            triggers: Mutex::new(Some(rx)),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the executor.
    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    /// Returns the current connectivity.
    pub fn connectivity(&self) -> Connectivity {
        self.monitor.current_state()
    }

    /// Returns a snapshot of the status.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn observe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Returns true while a pass is running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Returns the queued actions in FIFO order.
    pub async fn pending_actions(&self) -> Vec<QueuedAction> {
        self.log.list().await
    }

    /// Registers a callback invoked with `(temp_id, real_id)` when a create
    /// queued offline is confirmed by the remote store.
    ///
    /// Callbacks run outside the registry lock; one registered from inside a
    /// callback is first called on the next confirmed create.
    pub fn on_reconciled<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.reconcilers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    /// Appends an action to the durable log and publishes the new count.
    pub async fn enqueue(&self, action: QueuedAction) -> SyncResult<usize> {
        self.log.append(action).await?;
        let pending = self.log.len().await;
        self.status.send_modify(|s| s.pending_count = pending);
        Ok(pending)
    }

    /// Discards every queued action. Returns how many were dropped.
    pub async fn clear_all_pending(&self) -> SyncResult<usize> {
        let discarded = self.log.clear().await?;
        self.deferred.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.status.send_modify(|s| s.pending_count = 0);
        info!("Discarded {} unsynced changes", discarded);
        Ok(discarded)
    }

    /// Start-up step: drains if online with work pending.
    pub async fn start(&self) -> Option<DrainOutcome> {
        if self.monitor.is_online() && !self.log.is_empty().await {
            Some(self.drain().await)
        } else {
            None
        }
    }

    /// Drains now. A no-op when offline or already draining.
    pub async fn force_sync(&self) -> DrainOutcome {
        self.drain().await
    }

    /// Runs the start-up drain, then a drain on every transition to online.
    ///
    /// Returns `None` if the loop was already spawned. The task runs until
    /// aborted.
    pub fn spawn(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut triggers = self
            .triggers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            this.start().await;
            while triggers.recv().await.is_some() {
                let outcome = this.drain().await;
                debug!("Reconnect drain: {:?}", outcome);
            }
        }))
    }

    async fn drain(&self) -> DrainOutcome {
        if !self.monitor.is_online() {
            debug!("Offline, not draining");
            return DrainOutcome::Skipped(SkipReason::Offline);
        }
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!("Drain already in progress");
            return DrainOutcome::Skipped(SkipReason::AlreadyDraining);
        };

        self.status.send_modify(|s| {
            s.draining = true;
            s.last_errors.clear();
        });

        let mut errors = Vec::new();
        let mut report = DrainReport::default();

        // An earlier pass that could not be saved is written back before
        // anything new runs.
        if let Some(commit) = self.take_deferred() {
            match self.log.commit_pass(&commit).await {
                Ok(pending) => info!("Saved results of an earlier pass, {} pending", pending),
                Err(e) => {
                    errors.push(format!("could not save sync progress: {e}"));
                    self.defer(commit);
                    self.finish(None, errors);
                    return DrainOutcome::Completed(report);
                }
            }
        }

        let snapshot = self.log.list().await;
        let max_attempts = self.config.max_attempts;
        let mut commit = PassCommit::new();
        info!("Draining {} pending actions", snapshot.len());

        for mut action in snapshot {
            match self.executor.execute(&action).await {
                Ok(confirmed) => {
                    debug!("Synced {}", action.describe());
                    self.reconcile(&action, confirmed.as_ref());
                    commit.discard(action.id);
                    report.succeeded += 1;
                }
                Err(e) if !e.is_retryable() => {
                    warn!("Dropping {}: {}", action.describe(), e);
                    errors.push(format!("{}: {e}", action.describe()));
                    commit.discard(action.id);
                    report.rejected += 1;
                }
                Err(e) => {
                    action.attempts += 1;
                    if action.attempts >= max_attempts {
                        warn!("Giving up on {} after {} attempts: {}", action.describe(), action.attempts, e);
                        errors.push(format!(
                            "{}: dropped after {} failed attempts ({e})",
                            action.describe(),
                            action.attempts
                        ));
                        commit.discard(action.id);
                        report.exhausted += 1;
                    } else {
                        debug!("Will retry {} (attempt {}): {}", action.describe(), action.attempts, e);
                        commit.keep(action);
                        report.retried += 1;
                    }
                }
            }
        }

        let pending = match self.log.commit_pass(&commit).await {
            Ok(pending) => {
                report.persisted = true;
                Some(pending)
            }
            Err(e) => {
                warn!("Could not persist drain results: {}", e);
                errors.push(format!("could not save sync progress: {e}"));
                self.defer(commit);
                None
            }
        };

        info!(
            "Drain finished: {} synced, {} rejected, {} exhausted, {} retrying",
            report.succeeded, report.rejected, report.exhausted, report.retried
        );
        self.finish(pending, errors);
        DrainOutcome::Completed(report)
    }

    fn finish(&self, pending: Option<usize>, errors: Vec<String>) {
        self.status.send_modify(|s| {
            s.draining = false;
            if let Some(p) = pending {
                s.pending_count = p;
            }
            s.last_synced_at = Some(Utc::now());
            s.last_errors = errors;
        });
    }

    fn take_deferred(&self) -> Option<PassCommit> {
        self.deferred.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn defer(&self, commit: PassCommit) {
        *self.deferred.lock().unwrap_or_else(|e| e.into_inner()) = Some(commit);
    }

    fn reconcile(&self, action: &QueuedAction, confirmed: Option<&Record>) {
        let Mutation::Create { temp_id: Some(temp_id), .. } = &action.mutation else {
            return;
        };
        let Some(real_id) = confirmed.and_then(|r| r.get("id")).map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }) else {
            return;
        };
        debug!("Reconciled {} -> {}", temp_id, real_id);
        let handlers: Vec<ReconcileHandler> = self
            .reconcilers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for handler in &handlers {
            handler(temp_id, &real_id);
        }
    }
}

/// Holds the draining flag for the length of one pass.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
