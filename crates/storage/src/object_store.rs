//! Object storage interface for product outputs (S3 compatible).

use std::path::Path as LocalPath;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{StorageError, StorageResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3 endpoint URL
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow plain HTTP (local stores)
    pub allow_http: bool,
    /// `https://bucket.endpoint/key` instead of `https://endpoint/bucket/key`
    #[serde(default)]
    pub virtual_hosted_style: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "eo-data".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
            virtual_hosted_style: false,
        }
    }
}

impl ObjectStorageConfig {
    /// Build the S3 client described by this configuration.
    pub fn build_s3(&self) -> StorageResult<object_store::aws::AmazonS3> {
        AmazonS3Builder::new()
            .with_endpoint(&self.endpoint)
            .with_bucket_name(&self.bucket)
            .with_access_key_id(&self.access_key_id)
            .with_secret_access_key(&self.secret_access_key)
            .with_region(&self.region)
            .with_allow_http(self.allow_http)
            .with_virtual_hosted_style_request(self.virtual_hosted_style)
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))
    }
}

/// Object storage client bound to one bucket.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create an S3 client from config.
    pub fn new(config: &ObjectStorageConfig) -> StorageResult<Self> {
        let store = config.build_s3()?;
        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Wrap an existing backend, e.g. `object_store::memory::InMemory`.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The underlying backend.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    /// Write bytes to a key in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| StorageError::Write {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Read bytes from a key.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let location = Path::from(path);
        let read_err = |e: object_store::Error| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(path.to_string()),
            other => StorageError::Read {
                path: path.to_string(),
                message: other.to_string(),
            },
        };

        let result = self.store.get(&location).await.map_err(read_err)?;
        let bytes = result.bytes().await.map_err(read_err)?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Read {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Check if any object lives under a prefix (e.g. a Zarr store key).
    pub async fn exists_prefix(&self, prefix: &str) -> StorageResult<bool> {
        let prefix_path = Path::from(prefix);
        let mut stream = self.store.list(Some(&prefix_path));
        let first = stream.try_next().await.map_err(|e| StorageError::List {
            prefix: prefix.to_string(),
            message: e.to_string(),
        })?;
        Ok(first.is_some())
    }

    /// List objects with a given prefix.
    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream.try_next().await.map_err(|e| StorageError::List {
            prefix: prefix.to_string(),
            message: e.to_string(),
        })? {
            paths.push(meta.location.to_string());
        }

        paths.sort();
        Ok(paths)
    }

    /// Upload a local file, returning where it landed.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn upload_file(
        &self,
        local_path: &LocalPath,
        key: &str,
    ) -> StorageResult<(String, String)> {
        let data = tokio::fs::read(local_path).await?;
        self.put(key, Bytes::from(data)).await?;
        info!(key = %key, "Uploaded file");
        Ok((self.bucket.clone(), key.to_string()))
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        let location = Path::from(path);

        self.store
            .delete(&location)
            .await
            .map_err(|e| StorageError::Delete {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Delete every object under a prefix. Returns the number removed.
    #[instrument(skip(self), fields(bucket = %self.bucket, prefix = %prefix))]
    pub async fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let keys = self.list(prefix).await?;
        for key in &keys {
            self.delete(key).await?;
        }
        info!(count = keys.len(), "Deleted prefix");
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_storage() -> ObjectStorage {
        ObjectStorage::from_store(Arc::new(InMemory::new()), "test-bucket")
    }

    #[tokio::test]
    async fn test_put_get() {
        let storage = memory_storage();
        storage
            .put("eo/a/b.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(storage.get("eo/a/b.json").await.unwrap(), Bytes::from_static(b"{}"));
        assert!(storage.exists("eo/a/b.json").await.unwrap());
        assert!(!storage.exists("eo/a/c.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = memory_storage().get("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prefix_operations() {
        let storage = memory_storage();
        for key in ["tmp/x.zarr/zarr.json", "tmp/x.zarr/time/c/0", "keep/y.json"] {
            storage.put(key, Bytes::from_static(b"1")).await.unwrap();
        }

        assert!(storage.exists_prefix("tmp/x.zarr").await.unwrap());
        assert!(!storage.exists_prefix("tmp/other.zarr").await.unwrap());
        assert_eq!(storage.list("tmp").await.unwrap().len(), 2);

        assert_eq!(storage.delete_prefix("tmp").await.unwrap(), 2);
        assert!(!storage.exists_prefix("tmp").await.unwrap());
        assert!(storage.exists("keep/y.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("band.bin");
        std::fs::write(&local, [1u8, 2, 3]).unwrap();

        let storage = memory_storage();
        let (bucket, key) = storage.upload_file(&local, "out/band.bin").await.unwrap();

        assert_eq!(bucket, "test-bucket");
        assert_eq!(key, "out/band.bin");
        assert_eq!(storage.get(&key).await.unwrap().as_ref(), &[1u8, 2, 3]);
    }

    #[test]
    fn test_build_s3_client() {
        let config = ObjectStorageConfig::default();
        assert!(config.build_s3().is_ok());
    }
}
