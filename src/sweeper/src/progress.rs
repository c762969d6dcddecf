//! Periodic progress reporting.

use crate::counters::{RunCounters, as_mib};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Logs a progress line every interval until all discovered work is processed.
pub struct ProgressReporter {
    counters: RunCounters,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(counters: RunCounters, interval: Duration) -> Self {
        Self { counters, interval }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Tick until [`ProgressReporter::report`] says the run is complete.
    ///
    /// The first line comes one full interval after start. Completion may be
    /// observed one tick late.
    pub async fn run(self) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.report() {
                break;
            }
        }

        tracing::debug!("Progress reporter finished");
    }

    /// Emit one progress line. Returns `true` once the run is complete.
    ///
    /// Nothing is logged while the total is still unknown (zero).
    pub fn report(&self) -> bool {
        let snapshot = self.counters.snapshot();

        let Some(percent) = snapshot.progress_percent() else {
            return false;
        };

        tracing::info!(
            progress = %format!("{percent:.2}%"),
            processed = snapshot.processed,
            total = snapshot.total_discovered,
            deleted = snapshot.deleted,
            deleted_mb = %format!("{:.2}", as_mib(snapshot.deleted_bytes)),
            "Sweep progress"
        );

        self.counters.is_total_final() && snapshot.processed >= snapshot.total_discovered
    }
}
