//! Error types shared by the eo-datacube crates.

use thiserror::Error;

/// Result type alias using EoError.
pub type EoResult<T> = Result<T, EoError>;

/// Errors raised while parsing or validating shared product data.
#[derive(Debug, Error)]
pub enum EoError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Timestamp out of range for integer encoding: {0}")]
    TimestampOutOfRange(String),

    #[error("Invalid product metadata: {0}")]
    InvalidMetadata(String),
}

impl From<serde_json::Error> for EoError {
    fn from(err: serde_json::Error) -> Self {
        EoError::InvalidMetadata(format!("JSON error: {}", err))
    }
}
