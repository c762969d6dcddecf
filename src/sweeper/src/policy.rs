//! Age and size thresholds deciding which objects may be deleted.

use crate::bucket::ObjectDescriptor;
use chrono::{DateTime, Duration, Utc};

/// Cleanup policy, fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Objects modified within this many days of run start are kept.
    pub max_age_days: u64,
    /// Objects smaller than this are kept.
    pub min_size_bytes: u64,
    /// Identify and report eligible objects without deleting them.
    pub dry_run: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            min_size_bytes: 0,
            dry_run: true,
        }
    }
}

impl From<&common::config::CleanupConfig> for CleanupPolicy {
    fn from(config: &common::config::CleanupConfig) -> Self {
        Self {
            max_age_days: config.max_age_days,
            min_size_bytes: config.min_size_bytes,
            dry_run: config.dry_run,
        }
    }
}

impl CleanupPolicy {
    /// Cutoff timestamp: objects modified after it are too recent to delete.
    ///
    /// Saturates at the earliest representable time for absurd ages.
    pub fn threshold(&self, run_start: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.max_age_days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|age| run_start.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether `object` is old and large enough to be deleted.
    pub fn is_eligible(&self, object: &ObjectDescriptor, threshold: DateTime<Utc>) -> bool {
        if object.size < self.min_size_bytes {
            return false;
        }

        if object.last_modified > threshold {
            return false;
        }

        true
    }
}
