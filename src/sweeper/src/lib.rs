//! Bucket sweeper
//!
//! Lists an object-storage bucket, selects objects that are both old and
//! large enough, and deletes them with a bounded pool of workers while
//! reporting progress.
//!
//! - `bucket`: list/delete capability and the `object_store` adapter
//! - `policy`: age and size thresholds
//! - `counters`: shared run counters
//! - `enumerator`: listing passes feeding the work queue
//! - `worker`: fixed-size deletion pool
//! - `progress`: periodic progress lines
//! - `orchestrator`: run orchestration and final summary

pub mod bucket;
pub mod counters;
pub mod enumerator;
pub mod orchestrator;
pub mod policy;
pub mod progress;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use bucket::{Bucket, ObjectDescriptor, ObjectStoreBucket, StorageError};
pub use counters::{CounterSnapshot, RunCounters};
pub use enumerator::{EnumerationStats, Enumerator};
pub use orchestrator::{RunSummary, SweepOptions, Sweeper};
pub use policy::CleanupPolicy;
pub use progress::ProgressReporter;
pub use worker::{Disposition, WorkerPool};
