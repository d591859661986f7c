//! Common test fixtures.

use eo_common::ProductMetadata;

/// Product metadata of an NDVI tile acquired at `start_time`.
pub fn sample_metadata(start_time: &str) -> ProductMetadata {
    ProductMetadata {
        top_level_directory: "echoes".to_string(),
        platform: "sentinel-2".to_string(),
        instrument: "msi".to_string(),
        processing_level: "L2A".to_string(),
        start_time: start_time.to_string(),
        id: "ndvi_31UFS".to_string(),
        relative_orbit_number: 8,
        platform_serial_identifier: "S2B".to_string(),
        title: format!("S2B_MSIL2A_{}", start_time),
        source_product: None,
    }
}

/// Acquisition times of consecutive revisits, five days apart.
pub const REVISITS: [&str; 3] = [
    "2023-06-01T10:30:21.024000Z",
    "2023-06-06T10:30:19.024000Z",
    "2023-06-11T10:30:21.024000Z",
];
