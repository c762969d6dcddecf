//! Object storage capability used by the sweep pipeline.
//!
//! The pipeline only needs to list a bucket and delete single keys. [`Bucket`]
//! captures that, and [`ObjectStoreBucket`] provides it on top of any
//! `object_store` backend (S3-compatible, local filesystem, in-memory).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use std::sync::Arc;

/// Metadata snapshot of a single object, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Key, unique within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectMeta> for ObjectDescriptor {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.location.to_string(),
            size: meta.size,
            last_modified: meta.last_modified,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("listing failed: {0}")]
    List(#[source] object_store::Error),
    #[error("delete failed for {key}: {source}")]
    Delete {
        key: String,
        #[source]
        source: object_store::Error,
    },
    #[error("bucket {bucket} unreachable: {source}")]
    Unreachable {
        bucket: String,
        #[source]
        source: object_store::Error,
    },
    /// Failure reported by a non object_store backend.
    #[error("{0}")]
    Other(String),
}

/// List/delete capability over one bucket.
///
/// Implementations must be safe for concurrent use: every worker calls
/// [`Bucket::delete`] on the same shared instance.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Bucket name, for log records.
    fn name(&self) -> &str;

    /// Recursively list every object. Each call starts an independent,
    /// finite stream; individual entries may fail without ending it.
    fn list(&self) -> BoxStream<'_, Result<ObjectDescriptor, StorageError>>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Cheap reachability check run before any work is scheduled.
    async fn probe(&self) -> Result<(), StorageError>;
}

/// [`Bucket`] backed by an `object_store` rooted at the bucket.
pub struct ObjectStoreBucket {
    name: String,
    object_store: Arc<dyn ObjectStore>,
    prefix: Option<ObjectPath>,
}

impl ObjectStoreBucket {
    pub fn new(name: impl Into<String>, object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.into(),
            object_store,
            prefix: None,
        }
    }

    /// Restrict listing to keys under `prefix`.
    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(ObjectPath::from);
        self
    }
}

#[async_trait]
impl Bucket for ObjectStoreBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self) -> BoxStream<'_, Result<ObjectDescriptor, StorageError>> {
        self.object_store
            .list(self.prefix.as_ref())
            .map(|meta| meta.map(ObjectDescriptor::from).map_err(StorageError::List))
            .boxed()
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // Listed keys are already in path form; `ObjectPath::from` would encode them again.
        let delete_err = |source| StorageError::Delete {
            key: key.to_string(),
            source,
        };
        let object_path =
            ObjectPath::parse(key).map_err(|err| delete_err(object_store::Error::from(err)))?;
        self.object_store
            .delete(&object_path)
            .await
            .map_err(delete_err)
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.object_store
            .list_with_delimiter(self.prefix.as_ref())
            .await
            .map(|_| ())
            .map_err(|source| StorageError::Unreachable {
                bucket: self.name.clone(),
                source,
            })
    }
}
