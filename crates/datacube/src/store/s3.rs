//! S3 storage backend for Zarr stores.
//!
//! zarrs is synchronous; object_store is async. The async store is wrapped
//! in an async-to-sync adapter driven by the ambient tokio runtime.

use std::sync::Arc;

use zarrs::storage::ReadableWritableListableStorage;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use storage::ObjectStorageConfig;

use crate::error::Result;

/// Blocking executor usable from within a multi-threaded tokio runtime.
///
/// `block_in_place` moves the current task off the async worker thread before
/// the runtime handle drives the future, so runtimes are never nested.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Storage type alias for S3-backed Zarr access (sync adapter).
pub type S3Storage =
    AsyncToSyncStorageAdapter<AsyncObjectStore<object_store::aws::AmazonS3>, TokioBlockOn>;

/// Zarr storage on the bucket described by `config`.
pub fn create_s3_storage(config: &ObjectStorageConfig) -> Result<ReadableWritableListableStorage> {
    let s3 = config.build_s3()?;
    let async_store = Arc::new(AsyncObjectStore::new(s3));
    let sync_store: S3Storage = AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn);
    Ok(Arc::new(sync_store))
}
