//! Bucket enumeration feeding the worker queue.
//!
//! In [`EnumerationMode::TwoPass`] the bucket is listed once to count objects
//! and a second time to feed workers. Objects added or removed between the
//! two listings make the count and the fed set disagree; that is accepted.
//! [`EnumerationMode::SinglePass`] lists once and grows the total as it goes.

use crate::bucket::{Bucket, ObjectDescriptor};
use crate::counters::RunCounters;
use anyhow::Result;
use common::config::EnumerationMode;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Listing statistics for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnumerationStats {
    /// Objects put on the work queue.
    pub enqueued: u64,
    /// Listing entries that failed and were skipped, across all passes.
    pub listing_errors: u64,
}

pub struct Enumerator {
    bucket: Arc<dyn Bucket>,
    counters: RunCounters,
    mode: EnumerationMode,
}

impl Enumerator {
    pub fn new(bucket: Arc<dyn Bucket>, counters: RunCounters, mode: EnumerationMode) -> Self {
        Self {
            bucket,
            counters,
            mode,
        }
    }

    /// Enumerate the bucket onto `queue`, then close it.
    ///
    /// Awaits whenever the queue is full. The queue is closed exactly once,
    /// when this returns and `queue` is dropped. Fails only if every worker
    /// has gone away before enumeration finished.
    pub async fn run(self, queue: mpsc::Sender<ObjectDescriptor>) -> Result<EnumerationStats> {
        let mut stats = EnumerationStats::default();

        match self.mode {
            EnumerationMode::TwoPass => {
                let total = self.count_pass(&mut stats).await;
                self.counters.set_total_discovered(total);
                tracing::info!(bucket = %self.bucket.name(), total, "Counted objects in bucket");

                self.feed_pass(&queue, false, &mut stats).await?;
            }
            EnumerationMode::SinglePass => {
                self.feed_pass(&queue, true, &mut stats).await?;
                self.counters.mark_total_final();
                tracing::info!(
                    bucket = %self.bucket.name(),
                    total = self.counters.total_discovered(),
                    "Listed all objects in bucket"
                );
            }
        }

        tracing::debug!(
            enqueued = stats.enqueued,
            listing_errors = stats.listing_errors,
            "Enumeration complete, closing work queue"
        );

        Ok(stats)
    }

    async fn count_pass(&self, stats: &mut EnumerationStats) -> u64 {
        let mut count = 0;
        let mut listing = self.bucket.list();

        while let Some(entry) = listing.next().await {
            match entry {
                Ok(_) => count += 1,
                Err(e) => {
                    stats.listing_errors += 1;
                    tracing::warn!(error = %e, "Error listing objects, skipping entry");
                }
            }
        }

        count
    }

    /// List the bucket and enqueue every valid entry.
    ///
    /// With `grow_total`, each entry is counted as discovered before it is
    /// enqueued so `processed` never overtakes `total_discovered`.
    async fn feed_pass(
        &self,
        queue: &mpsc::Sender<ObjectDescriptor>,
        grow_total: bool,
        stats: &mut EnumerationStats,
    ) -> Result<()> {
        let mut listing = self.bucket.list();

        while let Some(entry) = listing.next().await {
            let object = match entry {
                Ok(object) => object,
                Err(e) => {
                    stats.listing_errors += 1;
                    tracing::warn!(error = %e, "Error listing objects, skipping entry");
                    continue;
                }
            };

            if grow_total {
                self.counters.record_discovered();
            }

            if queue.send(object).await.is_err() {
                anyhow::bail!("work queue closed before enumeration finished");
            }
            stats.enqueued += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBucket;
    use chrono::Utc;

    fn objects(count: usize) -> Vec<ObjectDescriptor> {
        (0..count)
            .map(|i| ObjectDescriptor {
                key: format!("obj-{i:03}"),
                size: i as u64,
                last_modified: Utc::now(),
            })
            .collect()
    }

    async fn drain(mut rx: mpsc::Receiver<ObjectDescriptor>) -> Vec<String> {
        let mut keys = Vec::new();
        while let Some(object) = rx.recv().await {
            keys.push(object.key);
        }
        keys
    }

    #[tokio::test]
    async fn test_two_pass_counts_then_feeds() {
        let bucket = Arc::new(ScriptedBucket::new(objects(5)));
        let counters = RunCounters::new();
        let (tx, rx) = mpsc::channel(16);

        let enumerator = Enumerator::new(bucket.clone(), counters.clone(), EnumerationMode::TwoPass);
        let stats = enumerator.run(tx).await.unwrap();

        assert_eq!(bucket.listing_calls(), 2);
        assert_eq!(counters.total_discovered(), 5);
        assert!(counters.is_total_final());
        assert_eq!(stats.enqueued, 5);
        assert_eq!(drain(rx).await.len(), 5);
    }

    #[tokio::test]
    async fn test_single_pass_lists_once() {
        let bucket = Arc::new(ScriptedBucket::new(objects(5)));
        let counters = RunCounters::new();
        let (tx, rx) = mpsc::channel(16);

        let enumerator =
            Enumerator::new(bucket.clone(), counters.clone(), EnumerationMode::SinglePass);
        let stats = enumerator.run(tx).await.unwrap();

        assert_eq!(bucket.listing_calls(), 1);
        assert_eq!(counters.total_discovered(), 5);
        assert!(counters.is_total_final());
        assert_eq!(stats.enqueued, 5);
        assert_eq!(drain(rx).await.len(), 5);
    }

    #[tokio::test]
    async fn test_listing_errors_are_skipped() {
        let bucket = Arc::new(ScriptedBucket::new(objects(3)).with_listing_errors(2));
        let counters = RunCounters::new();
        let (tx, rx) = mpsc::channel(16);

        let enumerator = Enumerator::new(bucket, counters.clone(), EnumerationMode::TwoPass);
        let stats = enumerator.run(tx).await.unwrap();

        assert_eq!(counters.total_discovered(), 3);
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.listing_errors, 4, "two errors in each pass");
        assert_eq!(drain(rx).await, vec!["obj-000", "obj-001", "obj-002"]);
    }

    #[tokio::test]
    async fn test_queue_closed_after_last_object() {
        let bucket = Arc::new(ScriptedBucket::new(objects(4)));
        let (tx, mut rx) = mpsc::channel(1);

        let enumerator = Enumerator::new(bucket, RunCounters::new(), EnumerationMode::TwoPass);
        let producer = tokio::spawn(enumerator.run(tx));

        // Capacity 1 forces the producer to wait on every item
        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 4);
        assert_eq!(producer.await.unwrap().unwrap().enqueued, 4);
    }

    #[tokio::test]
    async fn test_fails_when_consumers_are_gone() {
        let bucket = Arc::new(ScriptedBucket::new(objects(3)));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let enumerator = Enumerator::new(bucket, RunCounters::new(), EnumerationMode::TwoPass);
        assert!(enumerator.run(tx).await.is_err());
    }

    #[tokio::test]
    async fn test_two_pass_count_can_disagree_with_fed_set() {
        let added = ObjectDescriptor {
            key: "late-arrival".to_string(),
            size: 1,
            last_modified: Utc::now(),
        };
        let bucket =
            Arc::new(ScriptedBucket::new(objects(2)).added_after_first_listing([added]));
        let counters = RunCounters::new();
        let (tx, rx) = mpsc::channel(16);

        let enumerator = Enumerator::new(bucket, counters.clone(), EnumerationMode::TwoPass);
        enumerator.run(tx).await.unwrap();

        assert_eq!(counters.total_discovered(), 2);
        assert_eq!(drain(rx).await.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_bucket() {
        let bucket = Arc::new(ScriptedBucket::new(vec![]));
        let counters = RunCounters::new();
        let (tx, rx) = mpsc::channel(2);

        let enumerator = Enumerator::new(bucket, counters.clone(), EnumerationMode::TwoPass);
        let stats = enumerator.run(tx).await.unwrap();

        assert_eq!(stats.enqueued, 0);
        assert_eq!(counters.total_discovered(), 0);
        assert!(drain(rx).await.is_empty());
    }
}
