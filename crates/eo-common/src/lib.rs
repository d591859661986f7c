//! Common types and utilities shared across the eo-datacube crates.

pub mod error;
pub mod product;
pub mod time;

pub use error::{EoError, EoResult};
pub use product::{join_key, ProductMetadata};
pub use time::{from_epoch_nanos, parse_timestamp, to_epoch_nanos};
