//! Run orchestration: wires enumerator, worker pool and progress reporter.

use crate::bucket::Bucket;
use crate::counters::{CounterSnapshot, RunCounters, as_mib};
use crate::enumerator::{EnumerationStats, Enumerator};
use crate::policy::CleanupPolicy;
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressReporter};
use crate::worker::WorkerPool;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::config::{CleanupConfig, EnumerationMode};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything that shapes one sweep run.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub policy: CleanupPolicy,
    pub workers: usize,
    pub progress_interval: Duration,
    pub enumeration: EnumerationMode,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            policy: CleanupPolicy::default(),
            workers: 4,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            enumeration: EnumerationMode::TwoPass,
        }
    }
}

impl From<&CleanupConfig> for SweepOptions {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            policy: CleanupPolicy::from(config),
            workers: config.workers,
            progress_interval: config.progress_interval,
            enumeration: config.enumeration,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub threshold: DateTime<Utc>,
    pub counters: CounterSnapshot,
    pub listing_errors: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            total = self.counters.total_discovered,
            processed = self.counters.processed,
            deleted = self.counters.deleted,
            deleted_bytes = self.counters.deleted_bytes,
            deleted_mb = %format!("{:.2}", as_mib(self.counters.deleted_bytes)),
            listing_errors = self.listing_errors,
            elapsed = ?self.elapsed,
            "Cleanup complete"
        );
    }
}

/// Filter-and-delete sweep over one bucket.
pub struct Sweeper {
    bucket: Arc<dyn Bucket>,
    options: SweepOptions,
}

impl Sweeper {
    pub fn new(bucket: Arc<dyn Bucket>, options: SweepOptions) -> Self {
        Self { bucket, options }
    }

    /// Run a sweep with the threshold computed from the current time.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_at(Utc::now()).await
    }

    /// Run a sweep as if it started at `run_start`.
    ///
    /// Fails only on startup problems (unreachable bucket, bad options) or if
    /// a pipeline task dies; per-object failures are logged and counted.
    pub async fn run_at(&self, run_start: DateTime<Utc>) -> Result<RunSummary> {
        let started = Instant::now();
        let policy = self.options.policy;
        let threshold = policy.threshold(run_start);

        tracing::info!(
            bucket = %self.bucket.name(),
            threshold = %threshold,
            min_size_bytes = policy.min_size_bytes,
            min_size_mb = %format!("{:.2}", as_mib(policy.min_size_bytes)),
            dry_run = policy.dry_run,
            workers = self.options.workers,
            enumeration = ?self.options.enumeration,
            "Starting cleanup"
        );
        if policy.dry_run {
            tracing::info!("Dry run: eligible objects will be reported, not deleted");
        }

        self.bucket
            .probe()
            .await
            .with_context(|| format!("Cannot reach bucket {}", self.bucket.name()))?;

        let counters = RunCounters::new();

        let (queue, pool) = WorkerPool::spawn(
            self.options.workers,
            self.bucket.clone(),
            policy,
            threshold,
            counters.clone(),
        )?;

        let reporter =
            ProgressReporter::new(counters.clone(), self.options.progress_interval).spawn();

        let enumerator = Enumerator::new(
            self.bucket.clone(),
            counters.clone(),
            self.options.enumeration,
        );
        let enumeration = tokio::spawn(enumerator.run(queue));

        let stats: Result<EnumerationStats> = enumeration
            .await
            .context("Enumeration task failed")
            .and_then(|stats| stats);
        let joined = pool.join().await;
        reporter.abort();

        let stats = stats?;
        joined?;

        let summary = RunSummary {
            threshold,
            counters: counters.snapshot(),
            listing_errors: stats.listing_errors,
            elapsed: started.elapsed(),
        };
        summary.log();

        Ok(summary)
    }
}
