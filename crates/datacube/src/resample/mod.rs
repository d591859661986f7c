//! Swath to regular grid alignment.
//!
//! ```text
//! DataCube (lon/lat per sample)
//!      │
//!      ▼
//! SwathDefinition::from_cube ──► optimal_bb_area (no grid yet)
//!      │                              │
//!      ▼                              ▼
//! GaussianResampler::neighbours(swath, grid)   (once per write)
//!      │
//!      ▼
//! apply() per variable and time slice ──► DataCube on (y, x) + grid attrs
//! ```

pub mod area;
pub mod gaussian;
pub mod swath;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::DatacubeConfig;
use crate::error::Result;
use crate::grid::GridDefinition;
use crate::types::{Coordinate, DataCube, Variable};

pub use area::optimal_bb_area;
pub use gaussian::{GaussianResampler, NeighbourTable};
pub use swath::SwathDefinition;

/// Aligns datasets onto a regular grid.
#[derive(Debug, Clone, Default)]
pub struct GridResampler {
    resampler: GaussianResampler,
}

impl GridResampler {
    pub fn new(resampler: GaussianResampler) -> Self {
        Self { resampler }
    }

    pub fn from_config(config: &DatacubeConfig) -> Self {
        Self::new(GaussianResampler::from_config(config))
    }

    pub fn resampler(&self) -> &GaussianResampler {
        &self.resampler
    }

    /// Resample `cube` onto `grid`, deriving an optimal grid when none is given.
    ///
    /// Every data variable whose trailing two dimensions have the swath shape
    /// is resampled, a leading dimension (time) is kept slice by slice. Other
    /// variables pass through unchanged. Swath coordinates are replaced by
    /// `x`, `y`, `lon` and `lat` on the grid, and the grid definition is
    /// recorded in the dataset attributes.
    pub fn align(
        &self,
        cube: &DataCube,
        grid: Option<&GridDefinition>,
    ) -> Result<(DataCube, GridDefinition)> {
        cube.check_layout()?;
        let swath = SwathDefinition::from_cube(cube)?;

        let grid = match grid {
            Some(grid) => grid.clone(),
            None => {
                let derived = optimal_bb_area(&swath)?;
                info!(area_id = %derived.area_id, shape = ?derived.shape, "Derived target grid");
                derived
            }
        };
        grid.validate()?;

        let table = self.resampler.neighbours(&swath, &grid)?;
        debug!(
            covered = table.covered_cells(),
            cells = grid.rows() * grid.cols(),
            "Built neighbour table"
        );

        let mut data_vars = BTreeMap::new();
        for (name, var) in &cube.data_vars {
            if on_swath(var, &swath) {
                data_vars.insert(name.clone(), self.resample_variable(var, &table)?);
            } else {
                warn!(variable = %name, shape = ?var.shape, "Variable is not on the swath, kept as is");
                data_vars.insert(name.clone(), var.clone());
            }
        }

        let mut coords: BTreeMap<String, Coordinate> = cube
            .coords
            .iter()
            .filter(|(name, coord)| {
                !is_geolocation(name)
                    && !coord
                        .dims
                        .iter()
                        .any(|d| *d == swath.dims.0 || *d == swath.dims.1)
            })
            .map(|(name, coord)| (name.clone(), coord.clone()))
            .collect();

        let (lons, lats) = grid.lonlats()?;
        let shape = vec![grid.rows(), grid.cols()];
        coords.insert("x".into(), Coordinate::along("x", grid.x_coords()));
        coords.insert("y".into(), Coordinate::along("y", grid.y_coords()));
        coords.insert("lon".into(), Coordinate::new(&["y", "x"], shape.clone(), lons));
        coords.insert("lat".into(), Coordinate::new(&["y", "x"], shape, lats));

        let mut attrs = cube.attrs.clone();
        attrs.extend(grid.to_attributes());

        let aligned = DataCube {
            data_vars,
            coords,
            time: cube.time.clone(),
            time_fields: cube.time_fields.clone(),
            attrs,
        };
        Ok((aligned, grid))
    }

    fn resample_variable(&self, var: &Variable, table: &NeighbourTable) -> Result<Variable> {
        let rank = var.shape.len();
        let slice_len = table.source_len;
        let leading: Vec<usize> = var.shape[..rank - 2].to_vec();
        let slices: usize = leading.iter().product();

        let mut data = Vec::with_capacity(slices * table.rows * table.cols);
        for slice in var.data.chunks(slice_len) {
            data.extend(self.resampler.apply(table, slice));
        }

        let mut dims: Vec<String> = var.dims[..rank - 2].to_vec();
        dims.push("y".into());
        dims.push("x".into());
        let mut shape = leading;
        shape.push(table.rows);
        shape.push(table.cols);

        Ok(Variable {
            dims,
            shape,
            data,
            attrs: var.attrs.clone(),
        })
    }
}

fn on_swath(var: &Variable, swath: &SwathDefinition) -> bool {
    let rank = var.shape.len();
    rank >= 2
        && var.shape[rank - 2] == swath.rows
        && var.shape[rank - 1] == swath.cols
        && !swath.is_empty()
}

fn is_geolocation(name: &str) -> bool {
    matches!(name, "lon" | "lat" | "longitude" | "latitude" | "x" | "y")
}
