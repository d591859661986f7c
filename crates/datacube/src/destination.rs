//! Write destinations.

use std::fmt;

use eo_common::ProductMetadata;
use storage::StoragePath;

use crate::error::Result;

/// Key of one logical array store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteDestination {
    key: String,
}

impl WriteDestination {
    /// Destination for an explicit key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().trim_matches('/').to_string(),
        }
    }

    /// Datacube store of a product series. Stable for the same product
    /// identity and acquisition month.
    pub fn datacube(meta: &ProductMetadata) -> Result<Self> {
        meta.validate()?;
        Ok(Self::new(StoragePath::datacube_store(meta)?))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for WriteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<&str> for WriteDestination {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
