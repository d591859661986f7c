//! Key builders for consistent output layout.

use eo_common::{join_key, ProductMetadata};

use crate::error::StorageResult;

/// Path builder for consistent storage layout.
pub struct StoragePath;

impl StoragePath {
    /// Prefix shared by the single-file outputs of a product.
    /// Format: {top}/{platform}/{instrument}/{level}/{yyyy}/{mm}/{id}/{yyyymmdd}
    pub fn product_base(meta: &ProductMetadata) -> StorageResult<String> {
        Ok(meta.product_path()?)
    }

    /// Format: {product_base}.json
    pub fn metadata_json(meta: &ProductMetadata) -> StorageResult<String> {
        Ok(format!("{}.json", Self::product_base(meta)?))
    }

    /// Format: {product_base}_{variable}.bin
    pub fn raster_band(meta: &ProductMetadata, variable: &str) -> StorageResult<String> {
        Ok(format!("{}_{}.bin", Self::product_base(meta)?, variable))
    }

    /// Datacube store for a product series. Every acquisition of the same
    /// product identity within a month lands in the same store.
    /// Format: {top}/{platform}/{instrument}/{level}/{yyyy}/{mm}/{id}.zarr
    pub fn datacube_store(meta: &ProductMetadata) -> StorageResult<String> {
        let dt = meta.start_datetime()?;
        Ok(join_key(&[
            &meta.top_level_directory,
            &meta.platform,
            &meta.instrument,
            &meta.processing_level,
            &dt.format("%Y").to_string(),
            &dt.format("%m").to_string(),
            &format!("{}.zarr", meta.id),
        ]))
    }
}
