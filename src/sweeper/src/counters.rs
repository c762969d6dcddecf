//! Run counters shared between the enumerator, workers and progress reporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn store(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }
}

/// Thread-safe counters for one sweep run.
///
/// Cloning is cheap and every clone observes the same values.
#[derive(Debug, Clone, Default)]
pub struct RunCounters {
    inner: Arc<CountersInner>,
}

#[derive(Debug, Default)]
struct CountersInner {
    /// Objects found by the listing
    total_discovered: Counter,
    /// Objects that reached a final disposition
    processed: Counter,
    /// Objects successfully deleted
    deleted: Counter,
    /// Bytes freed by successful deletions
    deleted_bytes: Counter,
    /// Set once `total_discovered` will not change any more
    total_final: AtomicBool,
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub total_discovered: u64,
    pub processed: u64,
    pub deleted: u64,
    pub deleted_bytes: u64,
}

impl CounterSnapshot {
    /// Percentage of discovered objects processed, if anything was discovered.
    pub fn progress_percent(&self) -> Option<f64> {
        (self.total_discovered > 0)
            .then(|| self.processed as f64 / self.total_discovered as f64 * 100.0)
    }
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovered object while the total is still growing.
    pub fn record_discovered(&self) {
        self.inner.total_discovered.increment(1);
    }

    /// Replace the discovered total and mark it final.
    pub fn set_total_discovered(&self, total: u64) {
        self.inner.total_discovered.store(total);
        self.mark_total_final();
    }

    pub fn mark_total_final(&self) {
        self.inner.total_final.store(true, Ordering::Release);
    }

    pub fn record_processed(&self) {
        self.inner.processed.increment(1);
    }

    /// Record a successful deletion of `bytes`.
    pub fn record_deleted(&self, bytes: u64) {
        self.inner.deleted.increment(1);
        self.inner.deleted_bytes.increment(bytes);
    }

    pub fn total_discovered(&self) -> u64 {
        self.inner.total_discovered.load()
    }

    pub fn processed(&self) -> u64 {
        self.inner.processed.load()
    }

    pub fn deleted(&self) -> u64 {
        self.inner.deleted.load()
    }

    pub fn deleted_bytes(&self) -> u64 {
        self.inner.deleted_bytes.load()
    }

    pub fn is_total_final(&self) -> bool {
        self.inner.total_final.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_discovered: self.total_discovered(),
            processed: self.processed(),
            deleted: self.deleted(),
            deleted_bytes: self.deleted_bytes(),
        }
    }
}

/// Bytes as mebibytes, for log lines.
pub fn as_mib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
