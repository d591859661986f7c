//! Array store capability.

pub mod s3;
pub mod zarr;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::GridDefinition;
use crate::types::{Attributes, DataCube};

pub use s3::{create_s3_storage, TokioBlockOn};
pub use zarr::ZarrArrayStore;

/// Root group attribute holding per-array summaries.
pub const CONSOLIDATED_ATTR: &str = "consolidated_metadata";

/// Root group attribute holding text per-timestep fields.
pub const TIME_FIELDS_ATTR: &str = "time_fields";

/// How a write treats the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Fresh store; the destination must hold nothing.
    Create,
    /// Extend an existing store along `dim`.
    Append { dim: String },
}

/// Role of an array within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayKind {
    Time,
    Data,
    Field,
    Coord,
}

/// Consolidated entry of one array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySummary {
    pub kind: ArrayKind,
    pub shape: Vec<u64>,
    pub dims: Vec<String>,
    pub dtype: String,
}

/// What a store holds, read from its consolidated metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    /// Root attributes, bookkeeping keys excluded.
    pub attrs: Attributes,
    /// Grid recorded on the store, if any.
    pub grid: Option<GridDefinition>,
    pub arrays: BTreeMap<String, ArraySummary>,
    pub text_fields: BTreeMap<String, Vec<String>>,
    pub time_len: usize,
    pub last_time: Option<DateTime<Utc>>,
}

impl StoreSummary {
    /// Names of arrays of one kind.
    pub fn names(&self, kind: ArrayKind) -> Vec<&str> {
        self.arrays
            .iter()
            .filter(|(_, a)| a.kind == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Chunked array persistence keyed by destination.
pub trait ArrayStore {
    /// Whether anything is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Summary of the store at `key`, `None` when nothing is stored.
    fn read_summary(&self, key: &str) -> Result<Option<StoreSummary>>;

    /// Persist `cube` at `key`.
    fn write(&self, cube: &DataCube, key: &str, mode: WriteMode) -> Result<()>;
}
