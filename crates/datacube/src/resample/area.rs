//! Derivation of a target grid from a swath footprint.

use tracing::debug;

use crate::error::{DatacubeError, Result};
use crate::grid::GridDefinition;
use crate::projection::{wrap_longitude, Projection};
use crate::resample::swath::SwathDefinition;

/// Regular grid tightly covering the swath at its native resolution.
///
/// The grid uses an equidistant cylindrical projection centred on the swath
/// bounding box, which may straddle the antimeridian. Its extent is the projected bounding box of the valid
/// samples padded by half a pixel, with square pixels of the mean adjacent
/// sample spacing.
pub fn optimal_bb_area(swath: &SwathDefinition) -> Result<GridDefinition> {
    let (min_lon, min_lat, max_lon, max_lat) = swath
        .bounding_box()
        .ok_or_else(|| DatacubeError::DegenerateSwath("no valid geolocation".to_string()))?;

    if max_lon - min_lon > 180.0 {
        return Err(DatacubeError::DegenerateSwath(format!(
            "footprint spans {:.1} degrees of longitude",
            max_lon - min_lon
        )));
    }

    let projection = Projection::eqc_centred(
        wrap_longitude((min_lon + max_lon) / 2.0),
        (min_lat + max_lat) / 2.0,
    );

    let pixel = swath
        .mean_spacing(&projection)
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| {
            DatacubeError::DegenerateSwath("samples have no measurable spacing".to_string())
        })?;

    let mut xmin = f64::INFINITY;
    let mut ymin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for i in swath.valid_indices() {
        let (x, y) = projection.forward(swath.lons[i], swath.lats[i]);
        xmin = xmin.min(x);
        ymin = ymin.min(y);
        xmax = xmax.max(x);
        ymax = ymax.max(y);
    }

    let half = pixel / 2.0;
    let (xmin, ymax) = (xmin - half, ymax + half);
    let cols = ((xmax + half - xmin) / pixel).ceil().max(1.0) as usize;
    let rows = ((ymax - (ymin - half)) / pixel).ceil().max(1.0) as usize;

    // Snap the far edges so that cells are exactly `pixel` wide.
    let extent = [
        xmin,
        ymax - rows as f64 * pixel,
        xmin + cols as f64 * pixel,
        ymax,
    ];

    debug!(rows, cols, pixel, "Derived optimal bounding box grid");

    let grid = GridDefinition {
        area_id: format!("eqc_bb_{}x{}", rows, cols),
        proj_string: projection.to_proj_string(),
        shape: (rows, cols),
        extent,
    };
    grid.validate()?;
    Ok(grid)
}
