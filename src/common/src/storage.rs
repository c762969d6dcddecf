use anyhow::{Context, Result};
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::config::StorageConfig;

/// Create an object store for the configured bucket
///
/// The returned store is rooted at the bucket: keys passed to it are bucket-relative.
pub fn create_object_store(storage_config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let url = Url::parse(&storage_config.dsn)
        .map_err(|e| anyhow::anyhow!("Invalid storage DSN '{}': {}", storage_config.dsn, e))?;

    match url.scheme() {
        "file" => {
            let root = url.path();
            if root.is_empty() || root == "/" {
                return Err(anyhow::anyhow!(
                    "File DSN must specify a path: file:///path/to/buckets"
                ));
            }
            let bucket_dir = PathBuf::from(root).join(&storage_config.bucket);
            let store = LocalFileSystem::new_with_prefix(&bucket_dir).with_context(|| {
                format!("Bucket directory not accessible: {}", bucket_dir.display())
            })?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemory::new())),
        "s3" => {
            let builder = create_s3_builder(&url, storage_config)?;
            Ok(Arc::new(
                builder.build().context("Failed to build S3 client")?,
            ))
        }
        scheme => Err(anyhow::anyhow!(
            "Unsupported storage scheme: {}. Supported: file, memory, s3",
            scheme
        )),
    }
}

/// Create an S3 builder for an `s3://host[:port]` endpoint
///
/// Credentials come from the config, then the DSN user info, then the
/// usual AWS environment variables.
pub fn create_s3_builder(dsn: &Url, storage_config: &StorageConfig) -> Result<AmazonS3Builder> {
    let host = dsn
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Missing S3 host in DSN"))?;
    let port = dsn.port();

    if storage_config.bucket.is_empty() {
        return Err(anyhow::anyhow!("S3 storage requires storage.bucket"));
    }

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&storage_config.bucket)
        .with_region(&storage_config.region);

    let access_key = storage_config
        .access_key_id
        .clone()
        .or_else(|| (!dsn.username().is_empty()).then(|| dsn.username().to_string()));
    let secret_key = storage_config
        .secret_access_key
        .clone()
        .or_else(|| dsn.password().map(str::to_string));

    match access_key {
        Some(key) => {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret_key.unwrap_or_default());
        }
        None => {
            if let Ok(env_key) = std::env::var("AWS_ACCESS_KEY_ID") {
                builder = builder.with_access_key_id(env_key);
            }
            if let Ok(env_secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
                builder = builder.with_secret_access_key(env_secret);
            }
            if let Ok(env_region) = std::env::var("AWS_DEFAULT_REGION") {
                builder = builder.with_region(env_region);
            }
        }
    }

    // Real S3 needs no endpoint; anything else is S3-compatible (MinIO, etc)
    if !host.contains("amazonaws.com") {
        let scheme = if storage_config.use_ssl || port == Some(443) {
            "https"
        } else {
            "http"
        };
        let endpoint = match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        };
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(!storage_config.use_ssl)
            .with_virtual_hosted_style_request(false); // MinIO requires path-style URLs
    }

    Ok(builder)
}
