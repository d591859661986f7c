//! Gaussian-weighted nearest-neighbour resampling.
//!
//! Source samples are placed in earth-centred cartesian space and bucketed
//! on a cubic lattice whose edge equals the search radius, so each query
//! only inspects the 27 buckets around the target cell.

use std::collections::HashMap;

use crate::config::DatacubeConfig;
use crate::error::Result;
use crate::grid::GridDefinition;
use crate::projection::WGS84_A;
use crate::resample::swath::SwathDefinition;

type BucketKey = (i64, i64, i64);

/// Earth-centred cartesian position on a sphere of the WGS84 radius.
fn to_ecef(lon: f64, lat: f64) -> [f64; 3] {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    [
        WGS84_A * lat.cos() * lon.cos(),
        WGS84_A * lat.cos() * lon.sin(),
        WGS84_A * lat.sin(),
    ]
}

fn distance_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Spatial hash of source sample positions.
struct NeighbourIndex {
    edge: f64,
    points: Vec<[f64; 3]>,
    /// Swath index of each point.
    sources: Vec<usize>,
    buckets: HashMap<BucketKey, Vec<usize>>,
}

impl NeighbourIndex {
    fn build(swath: &SwathDefinition, edge: f64) -> Self {
        let mut index = Self {
            edge,
            points: Vec::new(),
            sources: Vec::new(),
            buckets: HashMap::new(),
        };
        for i in swath.valid_indices() {
            let point = to_ecef(swath.lons[i], swath.lats[i]);
            let key = index.key(&point);
            index.buckets.entry(key).or_default().push(index.points.len());
            index.points.push(point);
            index.sources.push(i);
        }
        index
    }

    fn key(&self, p: &[f64; 3]) -> BucketKey {
        (
            (p[0] / self.edge).floor() as i64,
            (p[1] / self.edge).floor() as i64,
            (p[2] / self.edge).floor() as i64,
        )
    }

    /// Up to `k` nearest samples within `radius`, nearest first, as
    /// (swath index, squared distance).
    fn nearest(&self, target: &[f64; 3], radius: f64, k: usize) -> Vec<(usize, f64)> {
        let (bx, by, bz) = self.key(target);
        let radius_sq = radius * radius;

        let mut found = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.buckets.get(&(bx + dx, by + dy, bz + dz)) else {
                        continue;
                    };
                    for &p in bucket {
                        let d = distance_sq(&self.points[p], target);
                        if d <= radius_sq {
                            found.push((self.sources[p], d));
                        }
                    }
                }
            }
        }

        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found.truncate(k);
        found
    }
}

/// Per-cell contributing samples and weights, computed once per swath/grid.
#[derive(Debug, Clone)]
pub struct NeighbourTable {
    pub rows: usize,
    pub cols: usize,
    /// Swath sample count the table was built for.
    pub source_len: usize,
    cells: Vec<Vec<(usize, f32)>>,
}

impl NeighbourTable {
    /// Cells that received at least one contributing sample.
    pub fn covered_cells(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }
}

/// Gaussian resampler with a fixed radius and kernel width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianResampler {
    /// Neighbour search radius (m).
    pub radius_m: f64,
    /// Kernel width (m); weights are `exp(-d²/σ²)`.
    pub sigma_m: f64,
    /// Maximum samples contributing to one cell.
    pub neighbours: usize,
}

impl Default for GaussianResampler {
    fn default() -> Self {
        Self::from_config(&DatacubeConfig::default())
    }
}

impl GaussianResampler {
    pub fn from_config(config: &DatacubeConfig) -> Self {
        Self {
            radius_m: config.resample_radius_m,
            sigma_m: config.resample_sigma_m,
            neighbours: config.resample_neighbours,
        }
    }

    /// Find the contributing samples of every grid cell.
    pub fn neighbours(&self, swath: &SwathDefinition, grid: &GridDefinition) -> Result<NeighbourTable> {
        let (lons, lats) = grid.lonlats()?;
        let index = NeighbourIndex::build(swath, self.radius_m);
        let sigma_sq = self.sigma_m * self.sigma_m;

        let cells = lons
            .iter()
            .zip(&lats)
            .map(|(&lon, &lat)| {
                if !(lon.is_finite() && lat.is_finite()) {
                    return Vec::new();
                }
                index
                    .nearest(&to_ecef(lon, lat), self.radius_m, self.neighbours)
                    .into_iter()
                    .map(|(src, d_sq)| (src, (-d_sq / sigma_sq).exp() as f32))
                    .collect()
            })
            .collect();

        Ok(NeighbourTable {
            rows: grid.rows(),
            cols: grid.cols(),
            source_len: swath.len(),
            cells,
        })
    }

    /// Resample one swath-shaped field. NaN samples do not contribute;
    /// cells without contributors are NaN.
    pub fn apply(&self, table: &NeighbourTable, values: &[f32]) -> Vec<f32> {
        table
            .cells
            .iter()
            .map(|contributors| {
                let mut sum = 0.0f64;
                let mut weight = 0.0f64;
                for &(src, w) in contributors {
                    let v = values[src];
                    if v.is_nan() {
                        continue;
                    }
                    sum += v as f64 * w as f64;
                    weight += w as f64;
                }
                if weight > 0.0 {
                    (sum / weight) as f32
                } else {
                    f32::NAN
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Projection;
    use crate::resample::area::optimal_bb_area;

    /// Regular swath with ~11 m spacing.
    fn swath(rows: usize, cols: usize) -> SwathDefinition {
        let step = 0.0001;
        let mut lons = Vec::new();
        let mut lats = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                lons.push(2.0 + c as f64 * step);
                lats.push(r as f64 * -step);
            }
        }
        SwathDefinition::new(rows, cols, lons, lats).unwrap()
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let swath = swath(8, 8);
        let grid = optimal_bb_area(&swath).unwrap();
        let resampler = GaussianResampler::default();

        let table = resampler.neighbours(&swath, &grid).unwrap();
        let out = resampler.apply(&table, &vec![7.5; swath.len()]);

        assert_eq!(out.len(), grid.rows() * grid.cols());
        assert!(table.covered_cells() > 0);
        for v in out.iter().filter(|v| !v.is_nan()) {
            assert!((v - 7.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_nan_inputs_are_ignored() {
        let swath = swath(4, 4);
        let grid = optimal_bb_area(&swath).unwrap();
        let resampler = GaussianResampler::default();
        let table = resampler.neighbours(&swath, &grid).unwrap();

        let mut values = vec![3.0f32; swath.len()];
        values[5] = f32::NAN;
        let out = resampler.apply(&table, &values);
        assert!(out.iter().filter(|v| !v.is_nan()).all(|v| (v - 3.0).abs() < 1e-4));

        let all_nan = resampler.apply(&table, &vec![f32::NAN; swath.len()]);
        assert!(all_nan.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_cells_out_of_radius_are_unset() {
        let swath = swath(3, 3);
        // A grid 1 km east of the swath: nothing within 40 m.
        let projection = Projection::eqc_centred(2.0, 0.0);
        let (x, y) = projection.forward(2.01, 0.0);
        let grid = GridDefinition {
            area_id: "far".to_string(),
            proj_string: projection.to_proj_string(),
            shape: (2, 2),
            extent: [x, y - 20.0, x + 20.0, y],
        };

        let resampler = GaussianResampler::default();
        let table = resampler.neighbours(&swath, &grid).unwrap();
        assert_eq!(table.covered_cells(), 0);
        assert!(resampler
            .apply(&table, &vec![1.0; swath.len()])
            .iter()
            .all(|v| v.is_nan()));
    }

    #[test]
    fn test_nearest_respects_neighbour_limit() {
        let swath = swath(5, 5);
        let index = NeighbourIndex::build(&swath, 40.0);
        let target = to_ecef(swath.lons[12], swath.lats[12]);

        let found = index.nearest(&target, 40.0, 8);
        assert_eq!(found.len(), 8);
        assert_eq!(found[0].0, 12);
        assert!(found.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}
