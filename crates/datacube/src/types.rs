//! In-memory dataset model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DatacubeError, Result};

/// Name of the time dimension / coordinate.
pub const TIME_DIM: &str = "time";

/// Free-form attributes of a dataset or variable.
pub type Attributes = BTreeMap<String, AttrValue>;

/// An attribute value.
///
/// `DateTime` and `Opaque` only arise from in-memory producers; they never
/// deserialize from JSON and are not persistable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Fixed numeric array.
    Array(Vec<f64>),
    /// Ordered sequence of values.
    Sequence(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
    #[serde(skip_deserializing)]
    DateTime(DateTime<Utc>),
    /// Non-primitive producer object (e.g. a function or handle), by description.
    #[serde(skip_deserializing)]
    Opaque(String),
    Null,
}

impl AttrValue {
    /// Whether the value can be stored in the store header.
    pub fn is_persistable(&self) -> bool {
        match self {
            AttrValue::Bool(_)
            | AttrValue::Int(_)
            | AttrValue::Float(_)
            | AttrValue::Text(_)
            | AttrValue::Array(_) => true,
            AttrValue::Sequence(items) => items.iter().all(AttrValue::is_persistable),
            AttrValue::Map(_) | AttrValue::DateTime(_) | AttrValue::Opaque(_) | AttrValue::Null => {
                false
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric list view of an `Array` or a `Sequence` of numbers.
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::Array(values) => Some(values.clone()),
            AttrValue::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    AttrValue::Int(i) => Some(*i as f64),
                    AttrValue::Float(f) => Some(*f),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// JSON form written to the store.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

/// Remove every attribute that cannot be persisted. Returns the removed keys.
pub fn sanitize_attributes(attrs: &mut Attributes) -> Vec<String> {
    let stripped: Vec<String> = attrs
        .iter()
        .filter(|(_, v)| !v.is_persistable())
        .map(|(k, _)| k.clone())
        .collect();
    for key in &stripped {
        attrs.remove(key);
    }
    stripped
}

/// A named data variable, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    #[serde(with = "nan_as_null")]
    pub data: Vec<f32>,
    #[serde(default)]
    pub attrs: Attributes,
}

impl Variable {
    pub fn new(dims: &[&str], shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape,
            data,
            attrs: Attributes::new(),
        }
    }

    /// Whether the leading dimension is time.
    pub fn is_time_indexed(&self) -> bool {
        self.dims.first().map(String::as_str) == Some(TIME_DIM)
    }

    /// Shape without the leading time dimension.
    pub fn spatial_shape(&self) -> &[usize] {
        if self.is_time_indexed() {
            &self.shape[1..]
        } else {
            &self.shape
        }
    }

    /// Prepend a length-1 time dimension.
    pub fn expand_time(&mut self) {
        self.dims.insert(0, TIME_DIM.to_string());
        self.shape.insert(0, 1);
    }

    fn check(&self, name: &str) -> Result<()> {
        check_layout(name, &self.dims, &self.shape, self.data.len())
    }
}

/// A coordinate variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl Coordinate {
    pub fn new(dims: &[&str], shape: Vec<usize>, values: Vec<f64>) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape,
            values,
        }
    }

    /// 1-D coordinate along `dim`.
    pub fn along(dim: &str, values: Vec<f64>) -> Self {
        let len = values.len();
        Self::new(&[dim], vec![len], values)
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub(crate) fn check(&self, name: &str) -> Result<()> {
        check_layout(name, &self.dims, &self.shape, self.values.len())
    }
}

/// A scalar field with one value per time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeField {
    Int(Vec<i64>),
    Text(Vec<String>),
}

impl TimeField {
    pub fn len(&self) -> usize {
        match self {
            TimeField::Int(v) => v.len(),
            TimeField::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The dataset being written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCube {
    #[serde(default)]
    pub data_vars: BTreeMap<String, Variable>,
    #[serde(default)]
    pub coords: BTreeMap<String, Coordinate>,
    /// Time coordinate, when the dataset has a time dimension.
    #[serde(default)]
    pub time: Option<Vec<DateTime<Utc>>>,
    /// Per-timestep scalar fields (orbit number, serial id, title).
    #[serde(default)]
    pub time_fields: BTreeMap<String, TimeField>,
    #[serde(default)]
    pub attrs: Attributes,
}

impl DataCube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, var: Variable) -> Self {
        self.data_vars.insert(name.to_string(), var);
        self
    }

    pub fn with_coord(mut self, name: &str, coord: Coordinate) -> Self {
        self.coords.insert(name.to_string(), coord);
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data_vars.is_empty()
    }

    /// Number of time steps (0 without a time dimension).
    pub fn time_len(&self) -> usize {
        self.time.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Check every variable and coordinate against its declared shape.
    pub fn check_layout(&self) -> Result<()> {
        for (name, var) in &self.data_vars {
            var.check(name)?;
        }
        for (name, coord) in &self.coords {
            coord.check(name)?;
        }
        Ok(())
    }

    /// Check every array against its declared shape and the time length.
    pub fn validate(&self) -> Result<()> {
        self.check_layout()?;
        let steps = self.time.as_ref().map(Vec::len);

        for (name, var) in &self.data_vars {
            if let (true, Some(steps)) = (var.is_time_indexed(), steps) {
                if var.shape[0] != steps {
                    return Err(DatacubeError::shape_mismatch(
                        name,
                        format!("{} time steps, dataset has {}", var.shape[0], steps),
                    ));
                }
            }
        }

        for (name, field) in &self.time_fields {
            if Some(field.len()) != steps {
                return Err(DatacubeError::shape_mismatch(
                    name,
                    format!("{} values for {:?} time steps", field.len(), steps),
                ));
            }
        }

        Ok(())
    }
}

fn check_layout(name: &str, dims: &[String], shape: &[usize], len: usize) -> Result<()> {
    if dims.len() != shape.len() {
        return Err(DatacubeError::shape_mismatch(
            name,
            format!("{} dims for a rank {} shape", dims.len(), shape.len()),
        ));
    }
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(DatacubeError::shape_mismatch(
            name,
            format!("shape {:?} needs {} values, got {}", shape, expected, len),
        ));
    }
    Ok(())
}

/// JSON has no NaN, so missing samples travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(data.iter().map(|v| if v.is_nan() { None } else { Some(*v) }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let values: Vec<Option<f32>> = Vec::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_attributes() {
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), AttrValue::from("ndvi"));
        attrs.insert("orbit".into(), AttrValue::Int(37));
        attrs.insert("scale".into(), AttrValue::Float(0.5));
        attrs.insert("shape".into(), AttrValue::Array(vec![10.0, 12.0]));
        attrs.insert(
            "bands".into(),
            AttrValue::Sequence(vec![AttrValue::from("b04"), AttrValue::from("b08")]),
        );
        attrs.insert("reader".into(), AttrValue::Opaque("<function reader>".into()));
        attrs.insert("start_time".into(), AttrValue::DateTime(Utc::now()));
        attrs.insert("area".into(), AttrValue::Map(BTreeMap::new()));
        attrs.insert(
            "nested".into(),
            AttrValue::Sequence(vec![AttrValue::Opaque("x".into())]),
        );

        let mut stripped = sanitize_attributes(&mut attrs);
        stripped.sort();

        assert_eq!(stripped, vec!["area", "nested", "reader", "start_time"]);
        assert_eq!(attrs.len(), 5);
        assert!(attrs.values().all(AttrValue::is_persistable));
    }

    #[test]
    fn test_attr_value_from_json() {
        let attrs: Attributes = serde_json::from_value(serde_json::json!({
            "flag": true,
            "count": 3,
            "ratio": 0.25,
            "label": "x",
            "extent": [0, 1.5],
            "mixed": [1, "a"],
            "none": null
        }))
        .unwrap();

        assert_eq!(attrs["flag"], AttrValue::Bool(true));
        assert_eq!(attrs["count"], AttrValue::Int(3));
        assert_eq!(attrs["ratio"], AttrValue::Float(0.25));
        assert_eq!(attrs["extent"], AttrValue::Array(vec![0.0, 1.5]));
        assert!(matches!(attrs["mixed"], AttrValue::Sequence(_)));
        assert_eq!(attrs["none"], AttrValue::Null);
    }

    #[test]
    fn test_validate_shape_mismatch() {
        let cube = DataCube::new().with_var("b", Variable::new(&["y", "x"], vec![2, 2], vec![0.0; 3]));
        assert!(matches!(
            cube.validate(),
            Err(DatacubeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_check_layout_rejects_short_data_and_bad_rank() {
        let short = DataCube::new()
            .with_var("b", Variable::new(&["time", "y", "x"], vec![2, 4, 4], vec![0.0; 17]));
        assert!(matches!(
            short.check_layout(),
            Err(DatacubeError::ShapeMismatch { .. })
        ));

        let flat = DataCube::new().with_coord("lon", Coordinate::new(&["y", "x"], vec![4], vec![0.0; 4]));
        assert!(matches!(
            flat.check_layout(),
            Err(DatacubeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_time_fields() {
        let mut cube = DataCube::new().with_var(
            "b",
            Variable::new(&["time", "x"], vec![1, 2], vec![0.0, 1.0]),
        );
        cube.time = Some(vec![Utc::now()]);
        cube.time_fields
            .insert("relativeOrbitNumber".into(), TimeField::Int(vec![1, 2]));
        assert!(cube.validate().is_err());

        cube.time_fields
            .insert("relativeOrbitNumber".into(), TimeField::Int(vec![1]));
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_variable_json_nan() {
        let var = Variable::new(&["x"], vec![2], vec![1.0, f32::NAN]);
        let json = serde_json::to_value(&var).unwrap();
        assert_eq!(json["data"], serde_json::json!([1.0, null]));

        let back: Variable = serde_json::from_value(json).unwrap();
        assert_eq!(back.data[0], 1.0);
        assert!(back.data[1].is_nan());
    }
}
