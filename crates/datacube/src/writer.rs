//! Datacube writer: time injection, grid alignment, create or append.

use tracing::{info, instrument, warn};

use eo_common::{parse_timestamp, ProductMetadata};

use crate::config::DatacubeConfig;
use crate::destination::WriteDestination;
use crate::error::{DatacubeError, Result};
use crate::grid::GridDefinition;
use crate::resample::GridResampler;
use crate::store::{ArrayStore, StoreSummary, WriteMode};
use crate::types::{sanitize_attributes, AttrValue, DataCube, TimeField, TIME_DIM};

/// Attribute holding the acquisition start of a dataset without a time dimension.
pub const START_TIME_ATTR: &str = "start_time";

/// Per-timestep fields attached on time injection.
pub const ORBIT_FIELD: &str = "relativeOrbitNumber";
pub const SERIAL_FIELD: &str = "platformSerialIdentifier";
pub const TITLE_FIELD: &str = "title";

/// Projection variable made redundant by the grid attributes.
const CRS_VARIABLE: &str = "crs";

/// Grid a write is aligned to, decided from the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum GridTarget {
    /// The store records a grid; every write is resampled onto it.
    Established(GridDefinition),
    /// Nothing stored yet; this write derives the grid.
    Seed,
    /// The store exists without a grid; data keeps its raw layout.
    Unaligned,
}

impl GridTarget {
    pub fn from_summary(summary: Option<&StoreSummary>) -> Self {
        match summary {
            None => GridTarget::Seed,
            Some(StoreSummary {
                grid: Some(grid), ..
            }) => GridTarget::Established(grid.clone()),
            Some(_) => GridTarget::Unaligned,
        }
    }
}

/// Writes datasets into append-only stores.
pub struct DatacubeWriter<S: ArrayStore> {
    store: S,
    resampler: GridResampler,
}

impl<S: ArrayStore> DatacubeWriter<S> {
    pub fn new(store: S, resampler: GridResampler) -> Self {
        Self { store, resampler }
    }

    pub fn from_config(store: S, config: &DatacubeConfig) -> Self {
        Self::new(store, GridResampler::from_config(config))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write a product's dataset to its datacube store.
    pub fn write_product(&self, cube: DataCube, meta: &ProductMetadata) -> Result<String> {
        let destination = WriteDestination::datacube(meta)?;
        self.write_with(cube, &destination, Some(meta))
    }

    /// Write `cube` to `destination`, returning the store key.
    pub fn write(&self, cube: DataCube, destination: &WriteDestination) -> Result<String> {
        self.write_with(cube, destination, None)
    }

    #[instrument(skip(self, cube, meta), fields(destination = %destination))]
    fn write_with(
        &self,
        mut cube: DataCube,
        destination: &WriteDestination,
        meta: Option<&ProductMetadata>,
    ) -> Result<String> {
        if cube.is_empty() {
            return Err(DatacubeError::EmptyDataset);
        }
        cube.check_layout()?;
        let key = destination.key();

        inject_time(&mut cube, meta)?;

        let summary = self.store.read_summary(key)?;
        let target = GridTarget::from_summary(summary.as_ref());
        let mut cube = self.align(cube, target)?;

        let stripped = sanitize_attributes(&mut cube.attrs);
        if !stripped.is_empty() {
            warn!(keys = ?stripped, "Stripped attributes that cannot be stored");
        }
        for var in cube.data_vars.values_mut() {
            sanitize_attributes(&mut var.attrs);
        }

        cube.data_vars.remove(CRS_VARIABLE);
        cube.coords.remove(CRS_VARIABLE);

        let mode = if self.store.exists(key)? {
            WriteMode::Append {
                dim: TIME_DIM.to_string(),
            }
        } else {
            WriteMode::Create
        };
        info!(mode = ?mode, steps = cube.time_len(), "Writing datacube");

        self.store.write(&cube, key, mode)?;
        Ok(key.to_string())
    }

    fn align(&self, cube: DataCube, target: GridTarget) -> Result<DataCube> {
        match target {
            GridTarget::Established(grid) => {
                info!(area_id = %grid.area_id, "Resampling onto stored grid");
                let (aligned, _) = self.resampler.align(&cube, Some(&grid))?;
                Ok(aligned)
            }
            GridTarget::Seed => match self.resampler.align(&cube, None) {
                Ok((aligned, grid)) => {
                    info!(area_id = %grid.area_id, shape = ?grid.shape, "Established grid");
                    Ok(aligned)
                }
                Err(e) if e.is_first_write_recoverable() => {
                    warn!(error = %e, "Nothing to align on first write, keeping raw layout");
                    Ok(cube)
                }
                Err(e) => Err(e),
            },
            GridTarget::Unaligned => {
                info!("Store has no grid, keeping raw layout");
                Ok(cube)
            }
        }
    }
}

/// Give a dataset without a time dimension a single time step, then
/// attach the per-timestep fields.
///
/// Data variables gain a leading `time` dimension. A dataset that already
/// has a time coordinate keeps it. Fields the dataset already carries are
/// kept; the others are attached when their length matches `time`.
pub fn inject_time(cube: &mut DataCube, meta: Option<&ProductMetadata>) -> Result<()> {
    if cube.time.is_none() {
        let start = match cube.attrs.get(START_TIME_ATTR) {
            Some(AttrValue::DateTime(dt)) => *dt,
            Some(AttrValue::Text(s)) => parse_timestamp(s)?,
            _ => match meta {
                Some(meta) => meta.start_datetime()?,
                None => return Err(DatacubeError::MissingStartTime),
            },
        };

        for var in cube.data_vars.values_mut() {
            if !var.is_time_indexed() {
                var.expand_time();
            }
        }
        cube.time = Some(vec![start]);
    }

    let steps = cube.time_len();
    for (name, field) in time_fields(cube, meta) {
        if cube.time_fields.contains_key(name) {
            continue;
        }
        if field.len() != steps {
            return Err(DatacubeError::shape_mismatch(
                name,
                format!("{} value(s) for {} time steps", field.len(), steps),
            ));
        }
        cube.time_fields.insert(name.to_string(), field);
    }
    Ok(())
}

/// Per-timestep fields from the product metadata, else from dataset attributes.
fn time_fields(cube: &DataCube, meta: Option<&ProductMetadata>) -> Vec<(&'static str, TimeField)> {
    if let Some(meta) = meta {
        return vec![
            (ORBIT_FIELD, TimeField::Int(vec![meta.relative_orbit_number])),
            (
                SERIAL_FIELD,
                TimeField::Text(vec![meta.platform_serial_identifier.clone()]),
            ),
            (TITLE_FIELD, TimeField::Text(vec![meta.title.clone()])),
        ];
    }

    let mut fields = Vec::new();
    if let Some(AttrValue::Int(orbit)) = cube.attrs.get(ORBIT_FIELD) {
        fields.push((ORBIT_FIELD, TimeField::Int(vec![*orbit])));
    }
    for name in [SERIAL_FIELD, TITLE_FIELD] {
        if let Some(text) = cube.attrs.get(name).and_then(AttrValue::as_str) {
            fields.push((name, TimeField::Text(vec![text.to_string()])));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::Variable;

    fn meta() -> ProductMetadata {
        ProductMetadata {
            top_level_directory: "echoes".to_string(),
            platform: "sentinel-2".to_string(),
            instrument: "msi".to_string(),
            processing_level: "L2A".to_string(),
            start_time: "2023-06-01T10:00:00.000000Z".to_string(),
            id: "ndvi".to_string(),
            relative_orbit_number: 8,
            platform_serial_identifier: "S2B".to_string(),
            title: "S2B_MSIL2A".to_string(),
            source_product: None,
        }
    }

    fn raw() -> DataCube {
        DataCube::new().with_var("b", Variable::new(&["y", "x"], vec![1, 2], vec![1.0, 2.0]))
    }

    #[test]
    fn test_inject_time_from_metadata() {
        let mut cube = raw();
        inject_time(&mut cube, Some(&meta())).unwrap();

        assert_eq!(
            cube.time,
            Some(vec![Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap()])
        );
        assert_eq!(cube.data_vars["b"].dims, vec!["time", "y", "x"]);
        assert_eq!(cube.data_vars["b"].shape, vec![1, 1, 2]);
        assert_eq!(cube.time_fields[ORBIT_FIELD], TimeField::Int(vec![8]));
        assert_eq!(
            cube.time_fields[SERIAL_FIELD],
            TimeField::Text(vec!["S2B".to_string()])
        );
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_inject_time_prefers_attribute() {
        let mut cube = raw().with_attr(START_TIME_ATTR, "01-Jul-2023 08:30:00.000000");
        inject_time(&mut cube, Some(&meta())).unwrap();
        assert_eq!(
            cube.time,
            Some(vec![Utc.with_ymd_and_hms(2023, 7, 1, 8, 30, 0).unwrap()])
        );
    }

    #[test]
    fn test_inject_time_keeps_existing_time_and_attaches_fields() {
        let mut cube = DataCube::new().with_var(
            "b",
            Variable::new(&["time", "y", "x"], vec![1, 1, 2], vec![1.0, 2.0]),
        );
        let times = vec![Utc.with_ymd_and_hms(2023, 6, 3, 9, 0, 0).unwrap()];
        cube.time = Some(times.clone());

        inject_time(&mut cube, Some(&meta())).unwrap();
        assert_eq!(cube.time, Some(times));
        assert_eq!(cube.time_fields[ORBIT_FIELD], TimeField::Int(vec![8]));
        assert_eq!(
            cube.time_fields[TITLE_FIELD],
            TimeField::Text(vec!["S2B_MSIL2A".to_string()])
        );
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_inject_time_rejects_field_length_mismatch() {
        let mut cube = DataCube::new().with_var(
            "b",
            Variable::new(&["time", "x"], vec![2, 1], vec![1.0, 2.0]),
        );
        cube.time = Some(vec![Utc::now(), Utc::now()]);

        assert!(matches!(
            inject_time(&mut cube, Some(&meta())),
            Err(DatacubeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_inject_time_existing_fields_are_kept() {
        let mut cube = DataCube::new().with_var(
            "b",
            Variable::new(&["time", "x"], vec![2, 1], vec![1.0, 2.0]),
        );
        cube.time = Some(vec![Utc::now(), Utc::now()]);
        cube.time_fields
            .insert(ORBIT_FIELD.into(), TimeField::Int(vec![8, 8]));
        cube.time_fields
            .insert(SERIAL_FIELD.into(), TimeField::Text(vec!["S2A".into(), "S2B".into()]));
        cube.time_fields
            .insert(TITLE_FIELD.into(), TimeField::Text(vec!["a".into(), "b".into()]));

        inject_time(&mut cube, Some(&meta())).unwrap();
        assert_eq!(cube.time_fields[ORBIT_FIELD], TimeField::Int(vec![8, 8]));
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_inject_time_without_fields_for_existing_time() {
        let mut cube = DataCube::new().with_var(
            "b",
            Variable::new(&["time", "x"], vec![2, 1], vec![1.0, 2.0]),
        );
        cube.time = Some(vec![Utc::now(), Utc::now()]);

        inject_time(&mut cube, None).unwrap();
        assert!(cube.time_fields.is_empty());
    }

    #[test]
    fn test_inject_time_without_start() {
        let mut cube = raw();
        assert!(matches!(
            inject_time(&mut cube, None),
            Err(DatacubeError::MissingStartTime)
        ));
    }

    #[test]
    fn test_grid_target_from_summary() {
        assert_eq!(GridTarget::from_summary(None), GridTarget::Seed);
    }
}
