//! Fixed-size pool of deletion workers fed by a bounded queue.

use crate::bucket::{Bucket, ObjectDescriptor};
use crate::counters::{RunCounters, as_mib};
use crate::policy::CleanupPolicy;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// What happened to a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Too small or too recent.
    Retained,
    /// Eligible, but the run is a dry run.
    WouldDelete,
    Deleted,
    /// Eligible, but the delete call failed. Not retried.
    Failed,
}

/// Queue capacity for a pool of `workers`.
pub fn queue_capacity(workers: usize) -> usize {
    workers * 2
}

struct Worker {
    id: usize,
    bucket: Arc<dyn Bucket>,
    policy: CleanupPolicy,
    threshold: DateTime<Utc>,
    counters: RunCounters,
}

impl Worker {
    async fn run(self, queue: Arc<Mutex<mpsc::Receiver<ObjectDescriptor>>>) {
        tracing::debug!(worker = self.id, "Worker started");

        loop {
            // Only held while waiting for the next item
            let next = queue.lock().await.recv().await;
            let Some(object) = next else {
                break;
            };
            self.handle(object).await;
        }

        tracing::debug!(worker = self.id, "Worker finished, queue closed and drained");
    }

    /// Filter, possibly delete, and account for one object.
    ///
    /// `processed` is bumped exactly once, after the disposition is known.
    async fn handle(&self, object: ObjectDescriptor) -> Disposition {
        let disposition = self.dispose(&object).await;
        self.counters.record_processed();
        disposition
    }

    async fn dispose(&self, object: &ObjectDescriptor) -> Disposition {
        if !self.policy.is_eligible(object, self.threshold) {
            tracing::trace!(key = %object.key, "Object retained");
            return Disposition::Retained;
        }

        tracing::info!(
            key = %object.key,
            size_bytes = object.size,
            size_mb = %format!("{:.2}", as_mib(object.size)),
            last_modified = %object.last_modified,
            dry_run = self.policy.dry_run,
            "Found object eligible for cleanup"
        );

        if self.policy.dry_run {
            return Disposition::WouldDelete;
        }

        match self.bucket.delete(&object.key).await {
            Ok(()) => {
                self.counters.record_deleted(object.size);
                tracing::info!(
                    key = %object.key,
                    size_bytes = object.size,
                    worker = self.id,
                    "Deleted object"
                );
                Disposition::Deleted
            }
            Err(e) => {
                tracing::error!(
                    key = %object.key,
                    error = %e,
                    worker = self.id,
                    "Failed to delete object"
                );
                Disposition::Failed
            }
        }
    }
}

/// Running pool of workers.
///
/// Dropping the [`mpsc::Sender`] returned by [`WorkerPool::spawn`] closes the
/// queue; workers exit once it is drained.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks sharing one queue of capacity `2 × workers`.
    pub fn spawn(
        workers: usize,
        bucket: Arc<dyn Bucket>,
        policy: CleanupPolicy,
        threshold: DateTime<Utc>,
        counters: RunCounters,
    ) -> Result<(mpsc::Sender<ObjectDescriptor>, Self)> {
        anyhow::ensure!(workers >= 1, "worker pool needs at least one worker");

        let (tx, rx) = mpsc::channel(queue_capacity(workers));
        let queue = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    bucket: bucket.clone(),
                    policy,
                    threshold,
                    counters: counters.clone(),
                };
                tokio::spawn(worker.run(queue.clone()))
            })
            .collect();

        tracing::debug!(
            workers,
            queue_capacity = queue_capacity(workers),
            "Worker pool started"
        );

        Ok((tx, Self { handles }))
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) -> Result<()> {
        for handle in self.handles {
            handle.await.context("Worker task failed")?;
        }
        Ok(())
    }
}
