//! Append-only Zarr datacubes built from satellite swaths.
//!
//! A write takes one acquisition as a [`DataCube`], resamples it onto the
//! destination's regular grid (deriving the grid on the first write) and
//! creates or grows the store along `time`.
//!
//! ```ignore
//! use datacube::{DatacubeConfig, DatacubeWriter, ZarrArrayStore};
//!
//! let config = DatacubeConfig::from_env();
//! let store = ZarrArrayStore::new(datacube::create_s3_storage(&storage_config)?, config.clone());
//! let writer = DatacubeWriter::from_config(store, &config);
//! let key = writer.write_product(cube, &metadata)?;
//! ```

pub mod config;
pub mod destination;
pub mod error;
pub mod grid;
pub mod output;
pub mod projection;
pub mod resample;
pub mod store;
pub mod types;
pub mod writer;

pub use config::{DatacubeConfig, ShuffleMode, ZarrCompression};
pub use destination::WriteDestination;
pub use error::{DatacubeError, Result};
pub use grid::GridDefinition;
pub use output::{OutputWriter, WriterKind};
pub use projection::Projection;
pub use resample::{GaussianResampler, GridResampler, SwathDefinition};
pub use store::{
    create_s3_storage, ArrayKind, ArrayStore, StoreSummary, WriteMode, ZarrArrayStore,
};
pub use types::{AttrValue, Attributes, Coordinate, DataCube, TimeField, Variable, TIME_DIM};
pub use writer::{DatacubeWriter, GridTarget};
