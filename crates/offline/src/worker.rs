//! Background worker draining the sync queue into the remote service.
//!
//! One worker instance is owned by the application's root composition and
//! carries an explicit `start`/`shutdown` lifecycle; there is no process
//! global. A pass runs immediately on start and then on a fixed interval;
//! overlapping passes cannot happen because the loop is a single task and
//! missed ticks are skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::connectivity::Connectivity;
use crate::error::SyncError;
use crate::queue::{EntryStatus, Operation, QueueEntry, SyncQueue};
use crate::remote::RemoteStore;
use crate::store::LocalStore;

/// Default time between sync passes.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Cap on the backoff applied after consecutive failing passes.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Counts from one sync pass, reported for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Entries delivered and removed from the queue.
    pub synced: usize,
    /// Entries that failed and remain queued for retry.
    pub failed: usize,
    /// Entries that exhausted their retry budget this pass.
    pub dead: usize,
    /// Entries deferred because connectivity dropped mid-pass.
    pub deferred: usize,
}

/// Background sync worker.
pub struct SyncWorker {
    store: LocalStore,
    queue: SyncQueue,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<Mutex<Connectivity>>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl SyncWorker {
    pub fn new(store: LocalStore, queue: SyncQueue, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            queue,
            remote,
            connectivity: Arc::new(Mutex::new(Connectivity::new())),
            interval: SYNC_INTERVAL,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Shared connectivity state (also consulted by UI surfaces).
    pub fn connectivity(&self) -> Arc<Mutex<Connectivity>> {
        self.connectivity.clone()
    }

    /// Request graceful shutdown of a started worker.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Start the background loop: one immediate pass, then one per interval.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let queue = self.queue.clone();
        let remote = self.remote.clone();
        let connectivity = self.connectivity.clone();
        let shutdown = self.shutdown.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            tracing::info!("sync worker started");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut consecutive_failures = 0u32;

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        tracing::info!("sync worker received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        match run_pass(&store, &queue, remote.as_ref(), &connectivity).await {
                            Ok(outcome) => {
                                consecutive_failures = 0;
                                if outcome != PassOutcome::default() {
                                    tracing::info!(
                                        synced = outcome.synced,
                                        failed = outcome.failed,
                                        dead = outcome.dead,
                                        deferred = outcome.deferred,
                                        "sync pass complete"
                                    );
                                }
                            }
                            Err(e) => {
                                consecutive_failures += 1;
                                let backoff = backoff_for(consecutive_failures);
                                tracing::warn!(
                                    error = %e,
                                    consecutive_failures,
                                    ?backoff,
                                    "sync pass failed"
                                );
                                tokio::select! {
                                    _ = shutdown.notified() => break,
                                    _ = tokio::time::sleep(backoff) => {}
                                }
                            }
                        }
                    }
                }
            }

            tracing::info!("sync worker stopped");
        })
    }

    /// Run one sync pass now (also used for explicit "sync" actions).
    pub async fn sync_now(&self) -> Result<PassOutcome, SyncError> {
        run_pass(&self.store, &self.queue, self.remote.as_ref(), &self.connectivity).await
    }
}

fn backoff_for(consecutive_failures: u32) -> Duration {
    let exp = consecutive_failures.min(8);
    std::cmp::min(Duration::from_secs(1 << exp), MAX_BACKOFF)
}

/// Drain the pending queue once.
///
/// Per-entry failures are isolated: an operation failure marks that entry
/// and moves on to the next. A connectivity drop defers the remainder of
/// the pass without charging anyone's retry budget.
async fn run_pass(
    store: &LocalStore,
    queue: &SyncQueue,
    remote: &dyn RemoteStore,
    connectivity: &Arc<Mutex<Connectivity>>,
) -> Result<PassOutcome, SyncError> {
    if !remote.check_connectivity().await {
        connectivity.lock().await.set_offline();
        return Err(SyncError::Offline);
    }
    connectivity.lock().await.set_online();

    let entries = queue
        .list_pending()
        .await
        .map_err(|e| SyncError::Store(e.to_string()))?;
    if entries.is_empty() {
        return Ok(PassOutcome::default());
    }

    tracing::debug!(pending = entries.len(), "draining sync queue");

    let mut outcome = PassOutcome::default();
    let mut deferred_rest = false;
    for entry in entries {
        if deferred_rest {
            outcome.deferred += 1;
            continue;
        }

        if let Err(e) = queue.mark_syncing(entry.id).await {
            tracing::error!(entry = %entry.id, "failed to mark entry syncing: {e:?}");
        }

        match deliver(remote, &entry).await {
            Ok(()) => {
                if let Err(e) = queue.complete(entry.id).await {
                    tracing::error!(entry = %entry.id, "failed to remove completed entry: {e:?}");
                }
                if let Err(e) = store.mark_synced(&entry.table, entry.record_id).await {
                    tracing::error!(entry = %entry.id, "failed to mark record synced: {e:?}");
                }
                outcome.synced += 1;
            }
            Err(e) if e.is_connectivity() => {
                // Leave the entry as it was and stop attempting operations.
                if let Err(err) = queue.mark_pending(entry.id).await {
                    tracing::error!(entry = %entry.id, "failed to re-pend entry: {err:?}");
                }
                connectivity.lock().await.set_offline();
                tracing::warn!(entry = %entry.id, error = %e, "connectivity lost mid-pass");
                outcome.deferred += 1;
                deferred_rest = true;
            }
            Err(e) => {
                match queue.mark_failed(entry.id, &e.to_string()).await {
                    Ok(EntryStatus::Dead) => {
                        tracing::error!(
                            entry = %entry.id,
                            table = %entry.table,
                            record = %entry.record_id,
                            error = %e,
                            "entry dead-lettered after repeated failures"
                        );
                        if let Err(err) = store.mark_error(&entry.table, entry.record_id).await {
                            tracing::error!(entry = %entry.id, "failed to mark record errored: {err:?}");
                        }
                        outcome.dead += 1;
                    }
                    Ok(_) => {
                        tracing::warn!(entry = %entry.id, error = %e, "sync operation failed, will retry");
                        outcome.failed += 1;
                    }
                    Err(err) => {
                        tracing::error!(entry = %entry.id, "failed to mark entry failed: {err:?}");
                        outcome.failed += 1;
                    }
                }
            }
        }
    }

    Ok(outcome)
}

async fn deliver(remote: &dyn RemoteStore, entry: &QueueEntry) -> Result<(), SyncError> {
    match entry.op {
        Operation::Create | Operation::Update => {
            remote.upsert(&entry.table, entry.record_id, &entry.payload).await
        }
        Operation::Delete => remote.delete(&entry.table, entry.record_id).await,
    }
}
