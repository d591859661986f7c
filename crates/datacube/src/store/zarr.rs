//! Zarr V3 array store.
//!
//! Layout of one store at `{key}`:
//!
//! ```text
//! {key}/zarr.json            root group: dataset attrs, grid attrs,
//!                            time_fields, consolidated_metadata
//! {key}/time                 Int64 [time], ns since epoch, chunk [1]
//! {key}/{var}                Float32 [time, y, x], chunk [1, y, x]
//! {key}/{field}              Int64 [time] per-timestep integers
//! {key}/{x,y,lon,lat}        Float64 static coordinates
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs::storage::{
    ListableStorageTraits, ReadableWritableListableStorage, ReadableWritableListableStorageTraits,
    StorePrefix,
};
use zarrs_filesystem::FilesystemStore;

use eo_common::{from_epoch_nanos, to_epoch_nanos};

use crate::config::{DatacubeConfig, ShuffleMode, ZarrCompression};
use crate::error::{DatacubeError, Result};
use crate::grid::GridDefinition;
use crate::store::{
    ArrayKind, ArrayStore, ArraySummary, StoreSummary, WriteMode, CONSOLIDATED_ATTR,
    TIME_FIELDS_ATTR,
};
use crate::types::{Attributes, DataCube, TimeField, TIME_DIM};

type StoreArray = Array<dyn ReadableWritableListableStorageTraits>;

/// Zarr store over any readable, writable and listable storage.
#[derive(Clone)]
pub struct ZarrArrayStore {
    storage: ReadableWritableListableStorage,
    config: DatacubeConfig,
}

impl ZarrArrayStore {
    pub fn new(storage: ReadableWritableListableStorage, config: DatacubeConfig) -> Self {
        Self { storage, config }
    }

    /// Store rooted at a local directory (created if missing).
    pub fn filesystem<P: AsRef<Path>>(root: P, config: DatacubeConfig) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let store = FilesystemStore::new(root.as_ref())
            .map_err(|e| DatacubeError::zarr(format!("failed to open filesystem store: {}", e)))?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn storage(&self) -> &ReadableWritableListableStorage {
        &self.storage
    }

    /// Read every value of a Float32 array.
    pub fn read_f32(&self, key: &str, name: &str) -> Result<(Vec<u64>, Vec<f32>)> {
        let array = self.open_array(key, name)?;
        let shape = array.shape().to_vec();
        let data = array
            .retrieve_array_subset_elements::<f32>(&full_subset(&shape)?)
            .map_err(|e| DatacubeError::zarr(format!("failed to read {}: {}", name, e)))?;
        Ok((shape, data))
    }

    /// Read every value of an Int64 array.
    pub fn read_i64(&self, key: &str, name: &str) -> Result<Vec<i64>> {
        let array = self.open_array(key, name)?;
        let shape = array.shape().to_vec();
        array
            .retrieve_array_subset_elements::<i64>(&full_subset(&shape)?)
            .map_err(|e| DatacubeError::zarr(format!("failed to read {}: {}", name, e)))
    }

    /// Raw root group attributes, bookkeeping included.
    pub fn root_attributes(&self, key: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
        let group = Group::open(self.storage.clone(), &node_path(key))
            .map_err(|e| DatacubeError::zarr(format!("failed to open group {}: {}", key, e)))?;
        Ok(group.attributes().clone())
    }

    fn open_array(&self, key: &str, name: &str) -> Result<StoreArray> {
        Array::open(self.storage.clone(), &array_path(key, name))
            .map_err(|e| DatacubeError::zarr(format!("failed to open {}: {}", name, e)))
    }

    fn create(&self, cube: &DataCube, key: &str) -> Result<()> {
        let times = require_time(cube)?;
        let steps = times.len() as u64;
        let mut consolidated = BTreeMap::new();

        let nanos = encode_times(times)?;
        self.create_array(key, TIME_DIM, &[steps], &[TIME_DIM.to_string()], DataType::Int64)?
            .store_array_subset_elements::<i64>(&full_subset(&[steps])?, &nanos)
            .map_err(|e| DatacubeError::zarr(e.to_string()))?;
        consolidated.insert(
            TIME_DIM.to_string(),
            summary(ArrayKind::Time, &[steps], &[TIME_DIM.to_string()], "int64"),
        );

        for (name, var) in &cube.data_vars {
            let shape = to_u64(&var.shape);
            let array = self.create_array(key, name, &shape, &var.dims, DataType::Float32)?;
            array
                .store_array_subset_elements::<f32>(&full_subset(&shape)?, &var.data)
                .map_err(|e| DatacubeError::zarr(format!("failed to write {}: {}", name, e)))?;
            debug!(variable = %name, shape = ?shape, "Wrote variable");
            consolidated.insert(
                name.clone(),
                summary(ArrayKind::Data, &shape, &var.dims, "float32"),
            );
        }

        for (name, values) in int_fields(cube) {
            let dims = [TIME_DIM.to_string()];
            self.create_array(key, name, &[steps], &dims, DataType::Int64)?
                .store_array_subset_elements::<i64>(&full_subset(&[steps])?, values)
                .map_err(|e| DatacubeError::zarr(format!("failed to write {}: {}", name, e)))?;
            consolidated.insert(
                name.clone(),
                summary(ArrayKind::Field, &[steps], &dims, "int64"),
            );
        }

        for (name, coord) in &cube.coords {
            if name == TIME_DIM {
                continue;
            }
            let shape = to_u64(&coord.shape);
            self.create_array(key, name, &shape, &coord.dims, DataType::Float64)?
                .store_array_subset_elements::<f64>(&full_subset(&shape)?, &coord.values)
                .map_err(|e| DatacubeError::zarr(format!("failed to write {}: {}", name, e)))?;
            consolidated.insert(
                name.clone(),
                summary(ArrayKind::Coord, &shape, &coord.dims, "float64"),
            );
        }

        let text_fields = text_fields(cube);
        self.write_root(key, &cube.attrs, &text_fields, &consolidated)?;

        info!(key = %key, steps, arrays = consolidated.len(), "Created store");
        Ok(())
    }

    fn append(&self, cube: &DataCube, key: &str, dim: &str) -> Result<()> {
        if dim != TIME_DIM {
            return Err(DatacubeError::SchemaMismatch(format!(
                "stores only grow along '{}', not '{}'",
                TIME_DIM, dim
            )));
        }
        let times = require_time(cube)?;
        let steps = times.len() as u64;

        let existing = self
            .read_summary(key)?
            .ok_or_else(|| DatacubeError::SchemaMismatch(format!("no store at {}", key)))?;
        check_schema(&existing, cube)?;

        if let (Some(last), Some(first)) = (existing.last_time, times.first()) {
            if *first <= last {
                warn!(last = %last, first = %first, "Appended time does not follow the stored time");
            }
        }

        let mut consolidated = existing.arrays.clone();
        let mut grow = |name: &str, kind: ArrayKind| -> Result<StoreArray> {
            let mut array = self.open_array(key, name)?;
            let mut shape = array.shape().to_vec();
            let offset = shape[0];
            shape[0] += steps;
            array.set_shape(shape.clone());
            array
                .store_metadata()
                .map_err(|e| DatacubeError::zarr(format!("failed to resize {}: {}", name, e)))?;
            if let Some(entry) = consolidated.get_mut(name) {
                entry.shape = shape;
            }
            debug!(array = %name, ?kind, offset, steps, "Growing array");
            Ok(array)
        };

        let nanos = encode_times(times)?;
        let (array, offset) = grown(grow(TIME_DIM, ArrayKind::Time)?, steps);
        array
            .store_array_subset_elements::<i64>(&append_subset(&[steps], offset)?, &nanos)
            .map_err(|e| DatacubeError::zarr(e.to_string()))?;

        for (name, var) in cube.data_vars.iter().filter(|(_, v)| v.is_time_indexed()) {
            let (array, offset) = grown(grow(name, ArrayKind::Data)?, steps);
            array
                .store_array_subset_elements::<f32>(
                    &append_subset(&to_u64(&var.shape), offset)?,
                    &var.data,
                )
                .map_err(|e| DatacubeError::zarr(format!("failed to append {}: {}", name, e)))?;
        }

        for (name, values) in int_fields(cube) {
            let (array, offset) = grown(grow(name, ArrayKind::Field)?, steps);
            array
                .store_array_subset_elements::<i64>(&append_subset(&[steps], offset)?, values)
                .map_err(|e| DatacubeError::zarr(format!("failed to append {}: {}", name, e)))?;
        }

        let mut text = existing.text_fields.clone();
        for (name, values) in text_fields(cube) {
            text.entry(name).or_default().extend(values);
        }

        // Grid attributes stay as recorded; other attributes follow the newest write.
        let mut attrs = existing.attrs.clone();
        for (name, value) in &cube.attrs {
            if existing.grid.is_none() || !is_grid_attr(name) {
                attrs.insert(name.clone(), value.clone());
            }
        }
        self.write_root(key, &attrs, &text, &consolidated)?;

        info!(key = %key, steps, total = existing.time_len as u64 + steps, "Appended to store");
        Ok(())
    }

    fn create_array(
        &self,
        key: &str,
        name: &str,
        shape: &[u64],
        dims: &[String],
        data_type: DataType,
    ) -> Result<StoreArray> {
        let (fill_value, typesize) = match data_type {
            DataType::Float32 => (FillValue::from(f32::NAN), 4),
            DataType::Float64 => (FillValue::from(f64::NAN), 8),
            _ => (FillValue::from(0i64), 8),
        };

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape(shape, dims)
            .try_into()
            .map_err(|e| DatacubeError::Config(format!("{:?}", e)))?;

        let mut builder = ArrayBuilder::new(shape.to_vec(), data_type, chunk_grid, fill_value);
        builder.dimension_names(Some(dims.to_vec()));

        if self.config.zarr_compression != ZarrCompression::None {
            builder.bytes_to_bytes_codecs(vec![self.compression_codec(typesize)?]);
        }

        let array = builder
            .build(self.storage.clone(), &array_path(key, name))
            .map_err(|e| DatacubeError::zarr(format!("failed to create {}: {}", name, e)))?;
        array
            .store_metadata()
            .map_err(|e| DatacubeError::zarr(format!("failed to store {} metadata: {}", name, e)))?;
        Ok(array)
    }

    fn compression_codec(
        &self,
        typesize: usize,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.zarr_compression_level)
            .map_err(|_| DatacubeError::Config("Invalid compression level".to_string()))?;

        let (shuffle, typesize) = match self.config.zarr_shuffle {
            ShuffleMode::None => (BloscShuffleMode::NoShuffle, None),
            ShuffleMode::Byte => (BloscShuffleMode::Shuffle, Some(typesize)),
            ShuffleMode::Bit => (BloscShuffleMode::BitShuffle, Some(typesize)),
        };

        let compressor = match self.config.zarr_compression {
            ZarrCompression::None => {
                return Err(DatacubeError::Config("No compression configured".to_string()))
            }
            ZarrCompression::Lz4 | ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::Zstd | ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| DatacubeError::Config(e.to_string()))?;
        Ok(Arc::new(codec))
    }

    /// Rewrite the root group: attributes plus bookkeeping.
    fn write_root(
        &self,
        key: &str,
        attrs: &Attributes,
        text_fields: &BTreeMap<String, Vec<String>>,
        consolidated: &BTreeMap<String, ArraySummary>,
    ) -> Result<()> {
        let mut map = serde_json::Map::new();
        for (name, value) in attrs {
            map.insert(name.clone(), value.to_json());
        }
        map.insert(TIME_FIELDS_ATTR.to_string(), serde_json::to_value(text_fields)?);
        map.insert(CONSOLIDATED_ATTR.to_string(), serde_json::to_value(consolidated)?);

        let group = GroupBuilder::new()
            .attributes(map)
            .build(self.storage.clone(), &node_path(key))
            .map_err(|e| DatacubeError::zarr(format!("failed to build group {}: {}", key, e)))?;
        group
            .store_metadata()
            .map_err(|e| DatacubeError::zarr(format!("failed to store group {}: {}", key, e)))?;
        Ok(())
    }
}

impl ArrayStore for ZarrArrayStore {
    fn exists(&self, key: &str) -> Result<bool> {
        let prefix = StorePrefix::new(format!("{}/", key.trim_matches('/')))
            .map_err(|e| DatacubeError::zarr(e.to_string()))?;
        let keys = self
            .storage
            .list_prefix(&prefix)
            .map_err(|e| DatacubeError::zarr(format!("failed to list {}: {}", key, e)))?;
        Ok(!keys.is_empty())
    }

    #[instrument(skip(self))]
    fn read_summary(&self, key: &str) -> Result<Option<StoreSummary>> {
        if !self.exists(key)? {
            return Ok(None);
        }

        let mut raw = self.root_attributes(key)?;
        let arrays: BTreeMap<String, ArraySummary> = match raw.remove(CONSOLIDATED_ATTR) {
            Some(value) => serde_json::from_value(value)?,
            None => BTreeMap::new(),
        };
        let text_fields: BTreeMap<String, Vec<String>> = match raw.remove(TIME_FIELDS_ATTR) {
            Some(value) => serde_json::from_value(value)?,
            None => BTreeMap::new(),
        };
        let attrs: Attributes = serde_json::from_value(serde_json::Value::Object(raw))?;
        let grid = GridDefinition::from_attributes(&attrs)?;

        let time_len = arrays
            .get(TIME_DIM)
            .and_then(|a| a.shape.first().copied())
            .unwrap_or(0);
        let last_time = if time_len > 0 {
            let array = self.open_array(key, TIME_DIM)?;
            let last = array
                .retrieve_array_subset_elements::<i64>(
                    &ArraySubset::new_with_start_shape(vec![time_len - 1], vec![1])
                        .map_err(|e| DatacubeError::zarr(e.to_string()))?,
                )
                .map_err(|e| DatacubeError::zarr(format!("failed to read time: {}", e)))?;
            last.first().copied().map(from_epoch_nanos)
        } else {
            None
        };

        Ok(Some(StoreSummary {
            attrs,
            grid,
            arrays,
            text_fields,
            time_len: time_len as usize,
            last_time,
        }))
    }

    #[instrument(skip(self, cube), fields(variables = cube.data_vars.len()))]
    fn write(&self, cube: &DataCube, key: &str, mode: WriteMode) -> Result<()> {
        cube.validate()?;
        match mode {
            WriteMode::Create => self.create(cube, key),
            WriteMode::Append { dim } => self.append(cube, key, &dim),
        }
    }
}

fn node_path(key: &str) -> String {
    format!("/{}", key.trim_matches('/'))
}

fn array_path(key: &str, name: &str) -> String {
    format!("{}/{}", node_path(key), name)
}

fn to_u64(shape: &[usize]) -> Vec<u64> {
    shape.iter().map(|&d| d as u64).collect()
}

/// One chunk per time step; whole extent otherwise. Never zero.
fn chunk_shape(shape: &[u64], dims: &[String]) -> Vec<u64> {
    shape
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            if i == 0 && dims.first().map(String::as_str) == Some(TIME_DIM) {
                1
            } else {
                d.max(1)
            }
        })
        .collect()
}

fn full_subset(shape: &[u64]) -> Result<ArraySubset> {
    ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.to_vec())
        .map_err(|e| DatacubeError::zarr(e.to_string()))
}

/// Subset of `shape` placed at `offset` along the first dimension.
fn append_subset(shape: &[u64], offset: u64) -> Result<ArraySubset> {
    let mut start = vec![0; shape.len()];
    start[0] = offset;
    ArraySubset::new_with_start_shape(start, shape.to_vec())
        .map_err(|e| DatacubeError::zarr(e.to_string()))
}

/// Array after growth, with the offset where the new steps start.
fn grown(array: StoreArray, steps: u64) -> (StoreArray, u64) {
    let offset = array.shape()[0] - steps;
    (array, offset)
}

fn summary(kind: ArrayKind, shape: &[u64], dims: &[String], dtype: &str) -> ArraySummary {
    ArraySummary {
        kind,
        shape: shape.to_vec(),
        dims: dims.to_vec(),
        dtype: dtype.to_string(),
    }
}

fn require_time(cube: &DataCube) -> Result<&[chrono::DateTime<chrono::Utc>]> {
    match cube.time.as_deref() {
        Some(times) if !times.is_empty() => Ok(times),
        _ => Err(DatacubeError::InvalidDataset(
            "store writes need a non-empty time coordinate".to_string(),
        )),
    }
}

fn encode_times(times: &[chrono::DateTime<chrono::Utc>]) -> Result<Vec<i64>> {
    times
        .iter()
        .map(|t| to_epoch_nanos(t).map_err(DatacubeError::from))
        .collect()
}

fn int_fields(cube: &DataCube) -> impl Iterator<Item = (&String, &Vec<i64>)> {
    cube.time_fields.iter().filter_map(|(name, field)| match field {
        TimeField::Int(values) => Some((name, values)),
        TimeField::Text(_) => None,
    })
}

fn text_fields(cube: &DataCube) -> BTreeMap<String, Vec<String>> {
    cube.time_fields
        .iter()
        .filter_map(|(name, field)| match field {
            TimeField::Text(values) => Some((name.clone(), values.clone())),
            TimeField::Int(_) => None,
        })
        .collect()
}

fn is_grid_attr(name: &str) -> bool {
    use crate::grid::{AREA_EXTENT_ATTR, AREA_ID_ATTR, PROJ_STRING_ATTR, SHAPE_ATTR};
    matches!(name, AREA_ID_ATTR | PROJ_STRING_ATTR | SHAPE_ATTR | AREA_EXTENT_ATTR)
}

/// An append must carry the same variables with the same trailing shapes.
fn check_schema(existing: &StoreSummary, cube: &DataCube) -> Result<()> {
    let stored: Vec<&str> = existing.names(ArrayKind::Data);
    let incoming: Vec<&str> = cube.data_vars.keys().map(String::as_str).collect();
    if stored != incoming {
        return Err(DatacubeError::SchemaMismatch(format!(
            "variables {:?} do not match stored {:?}",
            incoming, stored
        )));
    }

    for (name, var) in &cube.data_vars {
        let Some(entry) = existing.arrays.get(name) else {
            continue;
        };
        let stored_tail = entry.shape.get(1..).unwrap_or_default();
        let incoming_shape = to_u64(&var.shape);
        let matches = if var.is_time_indexed() {
            entry.dims.first().map(String::as_str) == Some(TIME_DIM)
                && stored_tail == incoming_shape.get(1..).unwrap_or_default()
        } else {
            entry.shape == incoming_shape
        };
        if !matches {
            return Err(DatacubeError::SchemaMismatch(format!(
                "'{}' has shape {:?}, store holds {:?}",
                name, incoming_shape, entry.shape
            )));
        }
    }

    let stored_fields: Vec<&str> = existing.names(ArrayKind::Field);
    let incoming_fields: Vec<&str> = int_fields(cube).map(|(n, _)| n.as_str()).collect();
    if stored_fields != incoming_fields {
        return Err(DatacubeError::SchemaMismatch(format!(
            "per-timestep fields {:?} do not match stored {:?}",
            incoming_fields, stored_fields
        )));
    }

    // Text fields live in the root attributes and must keep pace with `time`.
    let stored_text: Vec<&str> = existing.text_fields.keys().map(String::as_str).collect();
    let incoming_text: Vec<&str> = cube
        .time_fields
        .iter()
        .filter(|(_, f)| matches!(f, TimeField::Text(_)))
        .map(|(n, _)| n.as_str())
        .collect();
    if stored_text != incoming_text {
        return Err(DatacubeError::SchemaMismatch(format!(
            "per-timestep text fields {:?} do not match stored {:?}",
            incoming_text, stored_text
        )));
    }

    Ok(())
}
