//! In-process [`Bucket`] with scripted failures, for tests.

use crate::bucket::{Bucket, ObjectDescriptor, StorageError};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Bucket whose contents live in a map and whose failures are scripted.
///
/// Listings snapshot the map when [`Bucket::list`] is called and yield
/// entries in key order, preceded by any scripted listing errors.
#[derive(Default)]
pub struct ScriptedBucket {
    objects: Mutex<BTreeMap<String, ObjectDescriptor>>,
    failing_deletes: HashSet<String>,
    listing_errors: usize,
    unreachable: bool,
    delete_delay: Option<Duration>,
    added_after_first_listing: Mutex<Vec<ObjectDescriptor>>,
    listing_calls: AtomicUsize,
    delete_calls: Mutex<Vec<String>>,
}

impl ScriptedBucket {
    pub fn new(objects: impl IntoIterator<Item = ObjectDescriptor>) -> Self {
        Self {
            objects: Mutex::new(
                objects
                    .into_iter()
                    .map(|object| (object.key.clone(), object))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Deleting any of these keys fails and leaves the object in place.
    pub fn failing_deletes<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.failing_deletes = keys.into_iter().map(str::to_string).collect();
        self
    }

    /// Every listing yields `count` per-entry errors before the objects.
    pub fn with_listing_errors(mut self, count: usize) -> Self {
        self.listing_errors = count;
        self
    }

    /// Fail [`Bucket::probe`].
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Sleep before completing each delete call.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Objects that appear in the bucket right after the first listing starts.
    pub fn added_after_first_listing(
        self,
        objects: impl IntoIterator<Item = ObjectDescriptor>,
    ) -> Self {
        self.added_after_first_listing
            .lock()
            .unwrap()
            .extend(objects);
        self
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Keys passed to [`Bucket::delete`], in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Bucket for ScriptedBucket {
    fn name(&self) -> &str {
        "scripted"
    }

    fn list(&self) -> BoxStream<'_, Result<ObjectDescriptor, StorageError>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);

        let mut objects = self.objects.lock().unwrap();
        let snapshot: Vec<_> = objects.values().cloned().collect();
        for object in self.added_after_first_listing.lock().unwrap().drain(..) {
            objects.insert(object.key.clone(), object);
        }

        let errors = (0..self.listing_errors)
            .map(|i| Err(StorageError::Other(format!("corrupt listing entry {i}"))));
        futures::stream::iter(errors.chain(snapshot.into_iter().map(Ok))).boxed()
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.delete_calls.lock().unwrap().push(key.to_string());

        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_deletes.contains(key) {
            return Err(StorageError::Other(format!("access denied: {key}")));
        }

        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn probe(&self) -> Result<(), StorageError> {
        if self.unreachable {
            return Err(StorageError::Other("connection refused".to_string()));
        }
        Ok(())
    }
}
