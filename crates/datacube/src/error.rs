//! Error types for datacube writing and resampling.

use thiserror::Error;

/// Errors that can occur while aligning or persisting a datacube.
#[derive(Error, Debug)]
pub enum DatacubeError {
    /// The dataset has no data variables.
    #[error("the dataset is empty, set the dataset and metadata first")]
    EmptyDataset,

    /// Latitude/longitude arrays are neither 1-D nor 2-D.
    #[error("latitude/longitude arrays must be 1-D or 2-D, got rank {rank}")]
    UnsupportedGeometry { rank: usize },

    /// The dataset carries no usable lon/lat coordinates.
    #[error("missing coordinates: {0}")]
    MissingCoordinates(String),

    /// The swath footprint cannot define a grid.
    #[error("degenerate swath: {0}")]
    DegenerateSwath(String),

    /// Array length does not match its declared shape.
    #[error("shape mismatch for '{name}': {message}")]
    ShapeMismatch { name: String, message: String },

    /// A grid definition is incomplete or inconsistent.
    #[error("invalid grid definition: {0}")]
    InvalidGrid(String),

    /// The projection string names an unsupported projection.
    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),

    /// No start time to derive the time coordinate from.
    #[error("dataset has no time dimension and no start time")]
    MissingStartTime,

    /// An append does not match the layout of the existing store.
    #[error("schema mismatch with existing store: {0}")]
    SchemaMismatch(String),

    /// The dataset itself is malformed.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// Zarr format or codec error.
    #[error("Zarr error: {0}")]
    Zarr(String),

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),

    /// Product metadata error.
    #[error("metadata error: {0}")]
    Metadata(#[from] eo_common::EoError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatacubeError {
    /// Create a Zarr error.
    pub fn zarr(msg: impl Into<String>) -> Self {
        Self::Zarr(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidGrid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Whether a resampling failure can be skipped when the destination holds
    /// no data yet. Geometry errors of unexpected rank are always fatal.
    pub fn is_first_write_recoverable(&self) -> bool {
        matches!(self, Self::MissingCoordinates(_) | Self::DegenerateSwath(_))
    }
}

impl From<serde_json::Error> for DatacubeError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDataset(err.to_string())
    }
}

/// Result type for datacube operations.
pub type Result<T> = std::result::Result<T, DatacubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_write_recoverable() {
        assert!(DatacubeError::MissingCoordinates("lon".into()).is_first_write_recoverable());
        assert!(DatacubeError::DegenerateSwath("one point".into()).is_first_write_recoverable());
        assert!(!DatacubeError::UnsupportedGeometry { rank: 3 }.is_first_write_recoverable());
        assert!(!DatacubeError::EmptyDataset.is_first_write_recoverable());
    }
}
