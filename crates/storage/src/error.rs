//! Storage error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create object store client: {0}")]
    Client(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("list failed for prefix {prefix}: {message}")]
    List { prefix: String, message: String },

    #[error("failed to delete {path}: {message}")]
    Delete { path: String, message: String },

    #[error("invalid product metadata: {0}")]
    Metadata(#[from] eo_common::EoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
