//! Regular target grid definition.

use serde::{Deserialize, Serialize};

use crate::error::{DatacubeError, Result};
use crate::projection::Projection;
use crate::types::{AttrValue, Attributes};

pub const AREA_ID_ATTR: &str = "area_id";
pub const PROJ_STRING_ATTR: &str = "proj_string";
pub const SHAPE_ATTR: &str = "shape";
pub const AREA_EXTENT_ATTR: &str = "area_extent";

/// A regular projected pixel grid.
///
/// Immutable once established for a store: every later write to the same
/// destination resamples onto exactly this grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub area_id: String,
    pub proj_string: String,
    /// (rows, cols)
    pub shape: (usize, usize),
    /// [xmin, ymin, xmax, ymax] in projected units, outer cell edges.
    pub extent: [f64; 4],
}

impl GridDefinition {
    pub fn rows(&self) -> usize {
        self.shape.0
    }

    pub fn cols(&self) -> usize {
        self.shape.1
    }

    pub fn projection(&self) -> Result<Projection> {
        Projection::parse(&self.proj_string)
    }

    /// Cell size (dx, dy).
    pub fn pixel_size(&self) -> (f64, f64) {
        let [xmin, ymin, xmax, ymax] = self.extent;
        (
            (xmax - xmin) / self.cols() as f64,
            (ymax - ymin) / self.rows() as f64,
        )
    }

    /// Projected x of each column centre, west to east.
    pub fn x_coords(&self) -> Vec<f64> {
        let (dx, _) = self.pixel_size();
        (0..self.cols())
            .map(|i| self.extent[0] + (i as f64 + 0.5) * dx)
            .collect()
    }

    /// Projected y of each row centre, north to south.
    pub fn y_coords(&self) -> Vec<f64> {
        let (_, dy) = self.pixel_size();
        (0..self.rows())
            .map(|j| self.extent[3] - (j as f64 + 0.5) * dy)
            .collect()
    }

    /// Per-cell longitude and latitude, row-major.
    pub fn lonlats(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let projection = self.projection()?;
        let xs = self.x_coords();
        let ys = self.y_coords();

        let cells = self.rows() * self.cols();
        let mut lons = Vec::with_capacity(cells);
        let mut lats = Vec::with_capacity(cells);
        for &y in &ys {
            for &x in &xs {
                let (lon, lat) = projection.inverse(x, y);
                lons.push(lon);
                lats.push(lat);
            }
        }
        Ok((lons, lats))
    }

    pub fn validate(&self) -> Result<()> {
        if self.area_id.is_empty() {
            return Err(DatacubeError::invalid_grid("empty area_id"));
        }
        if self.rows() == 0 || self.cols() == 0 {
            return Err(DatacubeError::invalid_grid(format!(
                "shape {:?} has no cells",
                self.shape
            )));
        }
        let [xmin, ymin, xmax, ymax] = self.extent;
        if !self.extent.iter().all(|v| v.is_finite()) || xmax <= xmin || ymax <= ymin {
            return Err(DatacubeError::invalid_grid(format!(
                "extent {:?} is empty",
                self.extent
            )));
        }
        self.projection()?;
        Ok(())
    }

    /// Attribute form recorded on the store.
    pub fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(AREA_ID_ATTR.into(), AttrValue::Text(self.area_id.clone()));
        attrs.insert(
            PROJ_STRING_ATTR.into(),
            AttrValue::Text(self.proj_string.clone()),
        );
        attrs.insert(
            SHAPE_ATTR.into(),
            AttrValue::Sequence(vec![
                AttrValue::Int(self.rows() as i64),
                AttrValue::Int(self.cols() as i64),
            ]),
        );
        attrs.insert(
            AREA_EXTENT_ATTR.into(),
            AttrValue::Array(self.extent.to_vec()),
        );
        attrs
    }

    /// Recover a grid from attributes.
    ///
    /// `Ok(None)` when no grid was recorded; a partial record is an error.
    pub fn from_attributes(attrs: &Attributes) -> Result<Option<Self>> {
        let keys = [AREA_ID_ATTR, PROJ_STRING_ATTR, SHAPE_ATTR, AREA_EXTENT_ATTR];
        let present = keys.iter().filter(|k| attrs.contains_key(**k)).count();
        if present == 0 {
            return Ok(None);
        }
        if present < keys.len() {
            return Err(DatacubeError::invalid_grid(
                "incomplete grid attributes on store",
            ));
        }

        let text = |key: &str| {
            attrs
                .get(key)
                .and_then(AttrValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| DatacubeError::invalid_grid(format!("{} is not text", key)))
        };
        let numbers = |key: &str, len: usize| {
            attrs
                .get(key)
                .and_then(AttrValue::as_f64_list)
                .filter(|v| v.len() == len)
                .ok_or_else(|| {
                    DatacubeError::invalid_grid(format!("{} is not a list of {} numbers", key, len))
                })
        };

        let shape = numbers(SHAPE_ATTR, 2)?;
        let extent = numbers(AREA_EXTENT_ATTR, 4)?;

        let grid = Self {
            area_id: text(AREA_ID_ATTR)?,
            proj_string: text(PROJ_STRING_ATTR)?,
            shape: (shape[0] as usize, shape[1] as usize),
            extent: [extent[0], extent[1], extent[2], extent[3]],
        };
        grid.validate()?;
        Ok(Some(grid))
    }
}
