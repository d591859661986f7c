//! Storage abstractions for EO product outputs.
//!
//! Provides:
//! - Object storage (S3 compatible, or any `object_store` backend)
//! - Key builders for the product output layout

pub mod error;
pub mod object_store;
pub mod paths;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig};
pub use error::{StorageError, StorageResult};
pub use paths::StoragePath;
