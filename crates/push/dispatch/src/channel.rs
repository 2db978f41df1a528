//! Follow-up channel between the send path and reconciliation workers.
//!
//! Tasks are sharded by variant id, so one worker owns all tasks of a variant
//! and registry mutations for a variant never interleave.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use push_core::ReconciliationTask;
use push_storage::DeviceRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{FollowUpSink, PublishError, ResultReconciler};

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub workers: usize,
    /// Pending tasks per worker before `publish` waits.
    pub queue_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Producer side of the follow-up channel.
#[derive(Debug, Clone)]
pub struct FollowUpPublisher {
    shards: Arc<[mpsc::Sender<ReconciliationTask>]>,
}

impl FollowUpPublisher {
    fn shard_for(&self, variant_id: &str) -> &mpsc::Sender<ReconciliationTask> {
        let mut hasher = DefaultHasher::new();
        variant_id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }
}

impl FollowUpSink for FollowUpPublisher {
    async fn publish(&self, task: ReconciliationTask) -> Result<(), PublishError> {
        self.shard_for(&task.variant_id)
            .send(task)
            .await
            .map_err(|err| PublishError::Closed {
                variant_id: err.0.variant_id,
            })
    }
}

/// Counters returned when the workers drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
}

/// Handles of running reconciliation workers.
pub struct ReconcileWorkers {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl ReconcileWorkers {
    /// Wait for every worker to drain its queue.
    ///
    /// Workers stop once all publishers are dropped, so drop them first.
    pub async fn shutdown(self) -> WorkerStats {
        let mut total = WorkerStats::default();

        for handle in self.handles {
            match handle.await {
                Ok(stats) => {
                    total.completed += stats.completed;
                    total.failed += stats.failed;
                }
                Err(err) => tracing::error!(error = %err, "reconcile worker panicked"),
            }
        }

        total
    }
}

/// Start the reconciliation workers and return the publisher feeding them.
pub fn spawn_reconcile_workers<R>(
    reconciler: Arc<ResultReconciler<R>>,
    config: ChannelConfig,
) -> (FollowUpPublisher, ReconcileWorkers)
where
    R: DeviceRegistry + 'static,
{
    let workers = config.workers.max(1);
    let capacity = config.queue_capacity.max(1);

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);

    for worker in 0..workers {
        let (tx, rx) = mpsc::channel(capacity);
        senders.push(tx);
        handles.push(tokio::spawn(run_worker(worker, Arc::clone(&reconciler), rx)));
    }

    tracing::debug!(workers, capacity, "started reconcile workers");

    (
        FollowUpPublisher {
            shards: senders.into(),
        },
        ReconcileWorkers { handles },
    )
}

async fn run_worker<R>(
    worker: usize,
    reconciler: Arc<ResultReconciler<R>>,
    mut rx: mpsc::Receiver<ReconciliationTask>,
) -> WorkerStats
where
    R: DeviceRegistry + 'static,
{
    let mut stats = WorkerStats::default();

    while let Some(task) = rx.recv().await {
        let variant_id = task.variant_id.clone();
        let reconciler = Arc::clone(&reconciler);

        let result = tokio::task::spawn_blocking(move || reconciler.reconcile(&task)).await;

        match result {
            Ok(Ok(report)) => {
                stats.completed += 1;
                tracing::debug!(
                    worker,
                    variant_id = %variant_id,
                    mutations = report.mutations.len(),
                    removed = report.removed,
                    "reconciled task"
                );
            }
            Ok(Err(err)) => {
                stats.failed += 1;
                tracing::error!(worker, variant_id = %variant_id, error = %err, "reconciliation failed");
            }
            Err(err) => {
                stats.failed += 1;
                tracing::error!(worker, variant_id = %variant_id, error = %err, "reconciliation task aborted");
            }
        }
    }

    tracing::debug!(worker, ?stats, "reconcile worker stopped");
    stats
}
