use futures::StreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use sweeper::{CleanupPolicy, ObjectStoreBucket, SweepOptions, Sweeper};

async fn put(store: &InMemory, key: &str, len: usize) {
    store
        .put(&ObjectPath::from(key), PutPayload::from(vec![7u8; len]))
        .await
        .unwrap();
}

async fn remaining_keys(store: &InMemory) -> Vec<String> {
    let mut keys: Vec<String> = store
        .list(None)
        .map(|meta| meta.unwrap().location.to_string())
        .collect()
        .await;
    keys.sort();
    keys
}

fn options(dry_run: bool) -> SweepOptions {
    SweepOptions {
        // Everything written before the run starts is old enough
        policy: CleanupPolicy {
            max_age_days: 0,
            min_size_bytes: 1024,
            dry_run,
        },
        workers: 4,
        ..Default::default()
    }
}

async fn seeded_store() -> Arc<InMemory> {
    let store = Arc::new(InMemory::new());
    put(&store, "backups/full-1.tar", 4096).await;
    put(&store, "backups/full-2.tar", 8192).await;
    put(&store, "backups/manifest.json", 100).await;
    put(&store, "uploads/avatar.png", 2048).await;
    store
}

#[tokio::test]
async fn test_sweep_in_memory_store() {
    let store = seeded_store().await;
    let bucket = ObjectStoreBucket::new("archive", store.clone());

    let summary = Sweeper::new(Arc::new(bucket), options(false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.counters.total_discovered, 4);
    assert_eq!(summary.counters.processed, 4);
    assert_eq!(summary.counters.deleted, 3);
    assert_eq!(summary.counters.deleted_bytes, 4096 + 8192 + 2048);
    assert_eq!(remaining_keys(&store).await, vec!["backups/manifest.json"]);
}

#[tokio::test]
async fn test_sweep_respects_prefix() {
    let store = seeded_store().await;
    let bucket = ObjectStoreBucket::new("archive", store.clone()).with_prefix(Some("backups"));

    let summary = Sweeper::new(Arc::new(bucket), options(false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.counters.total_discovered, 3);
    assert_eq!(summary.counters.deleted, 2);
    assert_eq!(
        remaining_keys(&store).await,
        vec!["backups/manifest.json", "uploads/avatar.png"]
    );
}

#[tokio::test]
async fn test_dry_run_leaves_store_untouched() {
    let store = seeded_store().await;
    let bucket = ObjectStoreBucket::new("archive", store.clone());

    let summary = Sweeper::new(Arc::new(bucket), options(true))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.counters.processed, 4);
    assert_eq!(summary.counters.deleted, 0);
    assert_eq!(remaining_keys(&store).await.len(), 4);
}

#[tokio::test]
async fn test_sweep_deletes_keys_with_reserved_characters() {
    let store = Arc::new(InMemory::new());
    for key in ["photos/cat[1].jpg", "docs/100%.pdf", "plain.bin"] {
        store
            .put(
                &ObjectPath::parse(key).unwrap(),
                PutPayload::from(vec![7u8; 4096]),
            )
            .await
            .unwrap();
    }
    let bucket = ObjectStoreBucket::new("archive", store.clone());

    let summary = Sweeper::new(Arc::new(bucket), options(false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.counters.deleted, 3);
    assert_eq!(summary.counters.deleted_bytes, 3 * 4096);
    assert!(remaining_keys(&store).await.is_empty());
}

#[tokio::test]
async fn test_recent_objects_survive_default_age() {
    let store = seeded_store().await;
    let bucket = ObjectStoreBucket::new("archive", store.clone());
    let options = SweepOptions {
        policy: CleanupPolicy {
            max_age_days: 30,
            min_size_bytes: 0,
            dry_run: false,
        },
        ..Default::default()
    };

    let summary = Sweeper::new(Arc::new(bucket), options).run().await.unwrap();

    assert_eq!(summary.counters.processed, 4);
    assert_eq!(summary.counters.deleted, 0);
}

#[tokio::test]
async fn test_sweep_local_filesystem_bucket() {
    use common::config::StorageConfig;
    use common::storage::create_object_store;

    let root = tempfile::TempDir::new().unwrap();
    let bucket_dir = root.path().join("scratch");
    std::fs::create_dir_all(bucket_dir.join("tmp")).unwrap();
    std::fs::write(bucket_dir.join("tmp/big.bin"), vec![0u8; 4096]).unwrap();
    std::fs::write(bucket_dir.join("tmp/small.bin"), vec![0u8; 16]).unwrap();

    let config = StorageConfig {
        dsn: format!("file://{}", root.path().display()),
        bucket: "scratch".to_string(),
        ..Default::default()
    };
    let store = create_object_store(&config).unwrap();
    let bucket = ObjectStoreBucket::new(config.bucket.clone(), store);

    let summary = Sweeper::new(Arc::new(bucket), options(false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.counters.total_discovered, 2);
    assert_eq!(summary.counters.deleted, 1);
    assert!(!bucket_dir.join("tmp/big.bin").exists());
    assert!(bucket_dir.join("tmp/small.bin").exists());
}
