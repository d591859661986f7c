//! Irregular per-pixel geolocation of an observation.

use crate::error::{DatacubeError, Result};
use crate::projection::{wrap_longitude, Projection};
use crate::types::{Coordinate, DataCube};

/// Names accepted for the longitude coordinate, in lookup order.
const LON_NAMES: [&str; 2] = ["lon", "longitude"];
/// Names accepted for the latitude coordinate, in lookup order.
const LAT_NAMES: [&str; 2] = ["lat", "latitude"];

/// Swath geometry: one lon/lat pair per sample, row-major `(rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwathDefinition {
    pub rows: usize,
    pub cols: usize,
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    /// Dimension names of the swath axes in the source dataset.
    pub dims: (String, String),
}

impl SwathDefinition {
    /// Build a swath from 2-D lon/lat arrays of equal shape.
    pub fn new(rows: usize, cols: usize, lons: Vec<f64>, lats: Vec<f64>) -> Result<Self> {
        if lons.len() != rows * cols || lats.len() != rows * cols {
            return Err(DatacubeError::shape_mismatch(
                "lon/lat",
                format!(
                    "{} lons and {} lats for a {}x{} swath",
                    lons.len(),
                    lats.len(),
                    rows,
                    cols
                ),
            ));
        }
        Ok(Self {
            rows,
            cols,
            lons,
            lats,
            dims: ("y".to_string(), "x".to_string()),
        })
    }

    /// Swath from the dataset's lon/lat coordinates.
    ///
    /// 1-D coordinates are expanded into a mesh (rows follow latitude), 2-D
    /// coordinates are used as they are; any other rank is unsupported.
    pub fn from_cube(cube: &DataCube) -> Result<Self> {
        let lon = find_coord(cube, &LON_NAMES)?;
        let lat = find_coord(cube, &LAT_NAMES)?;
        lon.check("lon")?;
        lat.check("lat")?;

        match (lon.rank(), lat.rank()) {
            (1, 1) => {
                let rows = lat.values.len();
                let cols = lon.values.len();
                let mut lons = Vec::with_capacity(rows * cols);
                let mut lats = Vec::with_capacity(rows * cols);
                for &la in &lat.values {
                    for &lo in &lon.values {
                        lons.push(lo);
                        lats.push(la);
                    }
                }
                let mut swath = Self::new(rows, cols, lons, lats)?;
                swath.dims = (lat.dims[0].clone(), lon.dims[0].clone());
                Ok(swath)
            }
            (2, 2) => {
                if lon.shape != lat.shape {
                    return Err(DatacubeError::shape_mismatch(
                        "lon/lat",
                        format!("lon {:?} vs lat {:?}", lon.shape, lat.shape),
                    ));
                }
                let mut swath =
                    Self::new(lon.shape[0], lon.shape[1], lon.values.clone(), lat.values.clone())?;
                swath.dims = (lon.dims[0].clone(), lon.dims[1].clone());
                Ok(swath)
            }
            (1, 2) | (2, 1) => Err(DatacubeError::shape_mismatch(
                "lon/lat",
                format!("lon is rank {}, lat is rank {}", lon.rank(), lat.rank()),
            )),
            (lon_rank, lat_rank) => Err(DatacubeError::UnsupportedGeometry {
                rank: if lon_rank == 1 || lon_rank == 2 {
                    lat_rank
                } else {
                    lon_rank
                },
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether sample `i` has a usable location.
    pub fn is_valid(&self, i: usize) -> bool {
        let (lon, lat) = (self.lons[i], self.lats[i]);
        lon.is_finite() && lat.is_finite() && lat.abs() <= 90.0
    }

    /// Indices of samples with a usable location.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&i| self.is_valid(i))
    }

    /// (min_lon, min_lat, max_lon, max_lat) over valid samples.
    ///
    /// Longitudes are unwrapped around the first valid sample, so a swath
    /// crossing the antimeridian gets a contiguous box whose bounds may lie
    /// outside [-180, 180].
    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let reference = self.valid_indices().next().map(|i| self.lons[i])?;
        let mut bbox: Option<(f64, f64, f64, f64)> = None;
        for i in self.valid_indices() {
            let lon = reference + wrap_longitude(self.lons[i] - reference);
            let lat = self.lats[i];
            bbox = Some(match bbox {
                None => (lon, lat, lon, lat),
                Some((x0, y0, x1, y1)) => (x0.min(lon), y0.min(lat), x1.max(lon), y1.max(lat)),
            });
        }
        bbox
    }

    /// Mean projected distance between row- and column-adjacent valid samples.
    pub fn mean_spacing(&self, projection: &Projection) -> Option<f64> {
        let projected: Vec<Option<(f64, f64)>> = (0..self.len())
            .map(|i| {
                self.is_valid(i)
                    .then(|| projection.forward(self.lons[i], self.lats[i]))
            })
            .collect();

        let mut total = 0.0;
        let mut pairs = 0usize;
        let mut add = |a: usize, b: usize| {
            if let (Some((xa, ya)), Some((xb, yb))) = (projected[a], projected[b]) {
                total += ((xa - xb).powi(2) + (ya - yb).powi(2)).sqrt();
                pairs += 1;
            }
        };

        for r in 0..self.rows {
            for c in 0..self.cols {
                let i = r * self.cols + c;
                if c + 1 < self.cols {
                    add(i, i + 1);
                }
                if r + 1 < self.rows {
                    add(i, i + self.cols);
                }
            }
        }

        (pairs > 0).then(|| total / pairs as f64)
    }
}

fn find_coord<'a>(cube: &'a DataCube, names: &[&str]) -> Result<&'a Coordinate> {
    names
        .iter()
        .find_map(|name| cube.coords.get(*name))
        .ok_or_else(|| DatacubeError::MissingCoordinates(names.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    #[test]
    fn test_meshgrid_from_1d() {
        let cube = DataCube::new()
            .with_coord("lon", Coordinate::along("lon", vec![10.0, 11.0, 12.0]))
            .with_coord("lat", Coordinate::along("lat", vec![50.0, 49.0]));

        let swath = SwathDefinition::from_cube(&cube).unwrap();
        assert_eq!((swath.rows, swath.cols), (2, 3));
        assert_eq!(swath.lons, vec![10.0, 11.0, 12.0, 10.0, 11.0, 12.0]);
        assert_eq!(swath.lats, vec![50.0, 50.0, 50.0, 49.0, 49.0, 49.0]);
        assert_eq!(swath.dims, ("lat".to_string(), "lon".to_string()));
    }

    #[test]
    fn test_2d_coordinates() {
        let cube = DataCube::new()
            .with_coord("lon", Coordinate::new(&["row", "col"], vec![1, 2], vec![1.0, 2.0]))
            .with_coord("lat", Coordinate::new(&["row", "col"], vec![1, 2], vec![3.0, 4.0]));

        let swath = SwathDefinition::from_cube(&cube).unwrap();
        assert_eq!((swath.rows, swath.cols), (1, 2));
        assert_eq!(swath.dims.1, "col");
    }

    #[test]
    fn test_unsupported_rank() {
        let cube = DataCube::new()
            .with_coord(
                "lon",
                Coordinate::new(&["a", "b", "c"], vec![1, 1, 2], vec![1.0, 2.0]),
            )
            .with_coord(
                "lat",
                Coordinate::new(&["a", "b", "c"], vec![1, 1, 2], vec![1.0, 2.0]),
            );
        assert!(matches!(
            SwathDefinition::from_cube(&cube),
            Err(DatacubeError::UnsupportedGeometry { rank: 3 })
        ));
    }

    #[test]
    fn test_mixed_ranks_are_a_shape_mismatch() {
        let cube = DataCube::new()
            .with_coord("lon", Coordinate::along("x", vec![1.0, 2.0]))
            .with_coord("lat", Coordinate::new(&["y", "x"], vec![1, 2], vec![3.0, 4.0]));
        assert!(matches!(
            SwathDefinition::from_cube(&cube),
            Err(DatacubeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_coordinate_rank_must_match_shape() {
        let cube = DataCube::new()
            .with_coord("lon", Coordinate::new(&["y", "x"], vec![4], vec![0.0; 4]))
            .with_coord("lat", Coordinate::new(&["y", "x"], vec![4], vec![0.0; 4]));
        assert!(matches!(
            SwathDefinition::from_cube(&cube),
            Err(DatacubeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_bounding_box_across_antimeridian() {
        let swath = SwathDefinition::new(1, 2, vec![179.9, -179.9], vec![0.0, 0.0]).unwrap();
        let (min_lon, _, max_lon, _) = swath.bounding_box().unwrap();
        assert!((min_lon - 179.9).abs() < 1e-9);
        assert!((max_lon - 180.1).abs() < 1e-9);
    }

    #[test]
    fn test_missing_coordinates() {
        let cube = DataCube::new().with_coord("lon", Coordinate::along("lon", vec![1.0]));
        assert!(matches!(
            SwathDefinition::from_cube(&cube),
            Err(DatacubeError::MissingCoordinates(_))
        ));
    }

    #[test]
    fn test_bounding_box_skips_invalid() {
        let swath = SwathDefinition::new(
            1,
            3,
            vec![1.0, f64::NAN, 3.0],
            vec![10.0, 11.0, 12.0],
        )
        .unwrap();
        assert_eq!(swath.bounding_box(), Some((1.0, 10.0, 3.0, 12.0)));
    }
}
