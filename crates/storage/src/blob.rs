//! Blob gateway: opaque byte blobs under `gs://bucket/path` URIs.

use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::info;

use crate::error::StorageError;

/// Render a `gs://` URI for a path inside a bucket.
pub fn blob_uri(bucket: &str, path: &str) -> String {
    format!("gs://{}/{}", bucket, path.trim_start_matches('/'))
}

/// Split a `gs://bucket/path` URI into `(bucket, path)`.
pub fn parse_blob_uri(uri: &str) -> Result<(&str, &str), StorageError> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;
    let (bucket, path) = rest
        .split_once('/')
        .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;
    if bucket.is_empty() || path.is_empty() {
        return Err(StorageError::InvalidUri(uri.to_string()));
    }
    Ok((bucket, path))
}

/// Put/get of opaque byte blobs addressed by `gs://` URI.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, uri: &str, data: Bytes) -> Result<(), StorageError>;
    async fn get(&self, uri: &str) -> Result<Bytes, StorageError>;

    /// The bucket this store writes to; used to compose URIs.
    fn bucket(&self) -> &str;

    /// Convenience: put under this store's bucket, returning the URI.
    async fn put_path(&self, path: &str, data: Bytes) -> Result<String, StorageError> {
        let uri = blob_uri(self.bucket(), path);
        self.put(&uri, data).await?;
        Ok(uri)
    }
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, uri: &str, data: Bytes) -> Result<(), StorageError> {
        (**self).put(uri, data).await
    }
    async fn get(&self, uri: &str) -> Result<Bytes, StorageError> {
        (**self).get(uri).await
    }
    fn bucket(&self) -> &str {
        (**self).bucket()
    }
}

/// Shared put/get over any [`ObjectStore`], with bucket checking.
struct ObjectStoreBlob {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreBlob {
    fn object_path(&self, uri: &str) -> Result<Path, StorageError> {
        let (bucket, path) = parse_blob_uri(uri)?;
        if bucket != self.bucket {
            return Err(StorageError::InvalidUri(format!(
                "uri {uri} does not match configured bucket {}",
                self.bucket
            )));
        }
        Ok(Path::from(path))
    }

    async fn put(&self, uri: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.object_path(uri)?;
        self.store.put(&path, data.into()).await?;
        Ok(())
    }

    async fn get(&self, uri: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(uri)?;
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }
}

/// GCS-backed blob store.
pub struct GcsBlobStore {
    inner: ObjectStoreBlob,
}

impl GcsBlobStore {
    pub fn new(bucket: &str) -> Result<Self, StorageError> {
        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StorageError::NotConfigured(e.to_string()))?;
        info!("Blob: GCS backend gs://{}", bucket);
        Ok(Self {
            inner: ObjectStoreBlob {
                store: Arc::new(store),
                bucket: bucket.to_string(),
            },
        })
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, uri: &str, data: Bytes) -> Result<(), StorageError> {
        self.inner.put(uri, data).await
    }
    async fn get(&self, uri: &str) -> Result<Bytes, StorageError> {
        self.inner.get(uri).await
    }
    fn bucket(&self) -> &str {
        &self.inner.bucket
    }
}

/// Local-filesystem blob store for development. The `gs://bucket/...`
/// namespace maps onto a directory.
pub struct LocalBlobStore {
    inner: ObjectStoreBlob,
}

impl LocalBlobStore {
    pub fn new(dir: &FsPath, bucket: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| StorageError::Other(format!("create {}: {e}", dir.display())))?;
        let store = LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| StorageError::Other(format!("local filesystem error: {e}")))?;
        info!("Blob: local backend at {} (bucket {})", dir.display(), bucket);
        Ok(Self {
            inner: ObjectStoreBlob {
                store: Arc::new(store),
                bucket: bucket.to_string(),
            },
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, uri: &str, data: Bytes) -> Result<(), StorageError> {
        self.inner.put(uri, data).await
    }
    async fn get(&self, uri: &str) -> Result<Bytes, StorageError> {
        self.inner.get(uri).await
    }
    fn bucket(&self) -> &str {
        &self.inner.bucket
    }
}

/// In-memory blob store for tests.
pub struct MemoryBlobStore {
    inner: ObjectStoreBlob,
}

impl MemoryBlobStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            inner: ObjectStoreBlob {
                store: Arc::new(InMemory::new()),
                bucket: bucket.to_string(),
            },
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("fitglue-test")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, uri: &str, data: Bytes) -> Result<(), StorageError> {
        self.inner.put(uri, data).await
    }
    async fn get(&self, uri: &str) -> Result<Bytes, StorageError> {
        self.inner.get(uri).await
    }
    fn bucket(&self) -> &str {
        &self.inner.bucket
    }
}
