//! Synthetic swath generators.
//!
//! Swaths are laid out in metres on a local tangent plane around a centre
//! point and converted back to lon/lat, so sample spacing is predictable.

use datacube::{Coordinate, DataCube, Variable};

const METRES_PER_DEGREE: f64 = 111_320.0;

/// Parameters of a synthetic swath.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwathSpec {
    pub rows: usize,
    pub cols: usize,
    /// Centre longitude (degrees).
    pub lon: f64,
    /// Centre latitude (degrees).
    pub lat: f64,
    /// Distance between adjacent samples (m).
    pub spacing_m: f64,
    /// Rotation of the scan lines from east (degrees, counter-clockwise).
    pub rotation_deg: f64,
}

impl Default for SwathSpec {
    fn default() -> Self {
        Self {
            rows: 20,
            cols: 24,
            lon: 7.5,
            lat: 45.0,
            spacing_m: 10.0,
            rotation_deg: 0.0,
        }
    }
}

impl SwathSpec {
    /// 2-D lon/lat arrays, row-major.
    pub fn lonlats(&self) -> (Vec<f64>, Vec<f64>) {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let lon_scale = METRES_PER_DEGREE * self.lat.to_radians().cos();
        let row_mid = (self.rows as f64 - 1.0) / 2.0;
        let col_mid = (self.cols as f64 - 1.0) / 2.0;

        let mut lons = Vec::with_capacity(self.rows * self.cols);
        let mut lats = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let u = (col as f64 - col_mid) * self.spacing_m;
                let v = (row_mid - row as f64) * self.spacing_m;
                let east = u * cos - v * sin;
                let north = u * sin + v * cos;
                lons.push(self.lon + east / lon_scale);
                lats.push(self.lat + north / METRES_PER_DEGREE);
            }
        }
        (lons, lats)
    }

    /// Dataset with 2-D `lon`/`lat` on `(line, pixel)` and one variable per
    /// name filled with [`gradient_values`], offset by its position.
    pub fn cube(&self, variables: &[&str]) -> DataCube {
        let (lons, lats) = self.lonlats();
        let shape = vec![self.rows, self.cols];
        let mut cube = DataCube::new()
            .with_coord("lon", Coordinate::new(&["line", "pixel"], shape.clone(), lons))
            .with_coord("lat", Coordinate::new(&["line", "pixel"], shape.clone(), lats));
        for (i, name) in variables.iter().enumerate() {
            let data = gradient_values(self.rows, self.cols)
                .into_iter()
                .map(|v| v + i as f32)
                .collect();
            cube = cube.with_var(name, Variable::new(&["line", "pixel"], shape.clone(), data));
        }
        cube
    }
}

/// Swath rotated by `rotation_deg`, as flown by a sun-synchronous orbit.
pub fn rotated_swath(rows: usize, cols: usize, rotation_deg: f64) -> SwathSpec {
    SwathSpec {
        rows,
        cols,
        rotation_deg,
        ..SwathSpec::default()
    }
}

/// Axis-aligned swath centred on (`lon`, `lat`).
pub fn regular_swath(rows: usize, cols: usize, lon: f64, lat: f64) -> SwathSpec {
    SwathSpec {
        rows,
        cols,
        lon,
        lat,
        ..SwathSpec::default()
    }
}

/// Values rising smoothly from 0 at the first sample to 1 at the last.
///
/// Each value is `(row + col) / (rows + cols - 2)`.
pub fn gradient_values(rows: usize, cols: usize) -> Vec<f32> {
    let span = (rows + cols).saturating_sub(2).max(1) as f32;
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push((row + col) as f32 / span);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_values() {
        let data = gradient_values(3, 4);
        assert_eq!(data.len(), 12);
        assert_eq!(data[0], 0.0);
        assert_eq!(data[11], 1.0);
    }

    #[test]
    fn test_regular_swath_spacing() {
        let (lons, lats) = regular_swath(2, 2, 0.0, 0.0).lonlats();
        let metres = (lons[1] - lons[0]) * METRES_PER_DEGREE;
        assert!((metres - 10.0).abs() < 1e-6);
        assert!(lats[0] > lats[2]);
    }

    #[test]
    fn test_rotated_swath_is_rotated() {
        let (_, lats) = rotated_swath(2, 2, 30.0).lonlats();
        // Scan lines climb to the east.
        assert!(lats[1] > lats[0]);
    }

    #[test]
    fn test_cube_layout() {
        let cube = regular_swath(4, 5, 7.0, 45.0).cube(&["b04", "b08"]);
        assert_eq!(cube.data_vars.len(), 2);
        assert_eq!(cube.coords["lon"].shape, vec![4, 5]);
        assert!(cube.validate().is_ok());
    }
}
