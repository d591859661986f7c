//! Output dispatch over the supported writer kinds.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{info, instrument};

use eo_common::ProductMetadata;
use storage::{ObjectStorage, StoragePath};

use crate::error::{DatacubeError, Result};
use crate::store::ArrayStore;
use crate::types::{DataCube, Variable};
use crate::writer::DatacubeWriter;

/// What a write produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterKind {
    /// Raw little-endian float32 bands, one object per variable.
    /// `variable` restricts the export to one data variable.
    Raster { variable: Option<String> },
    /// Product metadata as JSON.
    Metadata,
    /// Append to the product's datacube store.
    Datacube,
}

impl WriterKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "raster" => Some(WriterKind::Raster { variable: None }),
            "metadata" => Some(WriterKind::Metadata),
            "datacube" => Some(WriterKind::Datacube),
            _ => None,
        }
    }
}

/// Dispatches a dataset to the writer for its kind.
pub struct OutputWriter<S: ArrayStore> {
    storage: ObjectStorage,
    datacube: DatacubeWriter<S>,
}

impl<S: ArrayStore> OutputWriter<S> {
    pub fn new(storage: ObjectStorage, datacube: DatacubeWriter<S>) -> Self {
        Self { storage, datacube }
    }

    pub fn datacube(&self) -> &DatacubeWriter<S> {
        &self.datacube
    }

    /// Write and return the location of what was written.
    ///
    /// Raster writes return the location of every band, comma separated.
    #[instrument(skip(self, cube, meta), fields(product = %meta.id))]
    pub async fn write(
        &self,
        kind: WriterKind,
        cube: DataCube,
        meta: &ProductMetadata,
    ) -> Result<String> {
        match kind {
            WriterKind::Metadata => {
                let path = StoragePath::metadata_json(meta)?;
                let body = serde_json::to_vec_pretty(meta)?;
                self.storage.put(&path, Bytes::from(body)).await?;
                info!(path = %path, "Wrote product metadata");
                Ok(self.location(&path))
            }
            WriterKind::Raster { variable } => {
                let bands = select_bands(&cube, variable.as_deref())?;
                let mut locations = Vec::with_capacity(bands.len());
                for (name, var) in bands {
                    let path = StoragePath::raster_band(meta, name)?;
                    self.storage.put(&path, first_slice_le(var)).await?;
                    info!(path = %path, "Wrote raster band");
                    locations.push(self.location(&path));
                }
                Ok(locations.join(","))
            }
            WriterKind::Datacube => {
                let key = self.datacube.write_product(cube, meta)?;
                Ok(self.location(&key))
            }
        }
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.storage.bucket(), key)
    }
}

fn select_bands<'a>(
    cube: &'a DataCube,
    variable: Option<&str>,
) -> Result<BTreeMap<&'a str, &'a Variable>> {
    if cube.is_empty() {
        return Err(DatacubeError::EmptyDataset);
    }
    match variable {
        Some(name) => cube
            .data_vars
            .get_key_value(name)
            .map(|(k, v)| BTreeMap::from([(k.as_str(), v)]))
            .ok_or_else(|| DatacubeError::InvalidDataset(format!("no variable '{}'", name))),
        None => Ok(cube
            .data_vars
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect()),
    }
}

/// First time slice of a variable (the whole variable without time).
fn first_slice_le(var: &Variable) -> Bytes {
    let len: usize = var.spatial_shape().iter().product();
    let mut buf = BytesMut::with_capacity(len * 4);
    for v in var.data.iter().take(len) {
        buf.put_f32_le(*v);
    }
    buf.freeze()
}
