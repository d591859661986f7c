//! Configuration for the datacube writer.

use serde::{Deserialize, Serialize};

/// Search radius of the Gaussian resampler, in metres.
pub const DEFAULT_RESAMPLE_RADIUS_M: f64 = 40.0;

/// Kernel width of the Gaussian resampler, in metres.
pub const DEFAULT_RESAMPLE_SIGMA_M: f64 = 20.0;

/// Maximum inputs contributing to one output cell.
pub const DEFAULT_RESAMPLE_NEIGHBOURS: usize = 8;

/// Configuration for store encoding and resampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatacubeConfig {
    /// Compression codec for every array in the store.
    pub zarr_compression: ZarrCompression,

    /// Compression level (1-9).
    pub zarr_compression_level: u8,

    /// Blosc shuffle filter.
    pub zarr_shuffle: ShuffleMode,

    /// Neighbour search radius (m). Fixed for a run, never derived from data.
    pub resample_radius_m: f64,

    /// Gaussian kernel width (m).
    pub resample_sigma_m: f64,

    /// Neighbours considered per output cell.
    pub resample_neighbours: usize,
}

impl Default for DatacubeConfig {
    fn default() -> Self {
        Self {
            zarr_compression: ZarrCompression::BloscZstd,
            zarr_compression_level: 3,
            zarr_shuffle: ShuffleMode::Byte,
            resample_radius_m: DEFAULT_RESAMPLE_RADIUS_M,
            resample_sigma_m: DEFAULT_RESAMPLE_SIGMA_M,
            resample_neighbours: DEFAULT_RESAMPLE_NEIGHBOURS,
        }
    }
}

impl DatacubeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ZARR_COMPRESSION") {
            config.zarr_compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.zarr_compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("ZARR_SHUFFLE") {
            config.zarr_shuffle = ShuffleMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("RESAMPLE_RADIUS_M") {
            if let Ok(radius) = val.parse() {
                config.resample_radius_m = radius;
            }
        }

        if let Ok(val) = std::env::var("RESAMPLE_SIGMA_M") {
            if let Ok(sigma) = val.parse() {
                config.resample_sigma_m = sigma;
            }
        }

        if let Ok(val) = std::env::var("RESAMPLE_NEIGHBOURS") {
            if let Ok(n) = val.parse() {
                config.resample_neighbours = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.zarr_compression_level == 0 || self.zarr_compression_level > 9 {
            return Err("zarr_compression_level must be 1-9".to_string());
        }

        if !(self.resample_radius_m.is_finite() && self.resample_radius_m > 0.0) {
            return Err("resample_radius_m must be > 0".to_string());
        }

        if !(self.resample_sigma_m.is_finite() && self.resample_sigma_m > 0.0) {
            return Err("resample_sigma_m must be > 0".to_string());
        }

        if self.resample_neighbours == 0 {
            return Err("resample_neighbours must be > 0".to_string());
        }

        Ok(())
    }
}

/// Compression codec for Zarr files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZarrCompression {
    None,
    Lz4,
    Zstd,
    BloscLz4,
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" => Self::Lz4,
            "zstd" => Self::Zstd,
            "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Blosc shuffle filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShuffleMode {
    None,
    #[default]
    Byte,
    Bit,
}

impl ShuffleMode {
    /// Parse from string (case-insensitive). Booleans map to byte / none.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" | "false" | "0" => Self::None,
            "bit" | "bitshuffle" | "2" => Self::Bit,
            _ => Self::Byte,
        }
    }
}
