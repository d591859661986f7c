//! Identity and per-acquisition metadata of an EO product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EoError, EoResult};
use crate::time::parse_timestamp;

/// Catalogue metadata describing one acquired product.
///
/// Field names on the wire follow the catalogue (OpenSearch) vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    /// Top level directory (key prefix) for all outputs.
    pub top_level_directory: String,
    pub platform: String,
    pub instrument: String,
    #[serde(rename = "processingLevel")]
    pub processing_level: String,
    /// Acquisition start, e.g. `2022-03-01T10:15:30.123456Z`.
    #[serde(rename = "startTimeFromAscendingNode")]
    pub start_time: String,
    /// Product identifier.
    pub id: String,
    #[serde(rename = "relativeOrbitNumber")]
    pub relative_orbit_number: i64,
    #[serde(rename = "platformSerialIdentifier")]
    pub platform_serial_identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_product: Option<String>,
}

impl ProductMetadata {
    /// Parsed acquisition start time.
    pub fn start_datetime(&self) -> EoResult<DateTime<Utc>> {
        parse_timestamp(&self.start_time)
    }

    /// Check that every path component is usable as a key segment.
    pub fn validate(&self) -> EoResult<()> {
        let components = [
            ("platform", &self.platform),
            ("instrument", &self.instrument),
            ("processingLevel", &self.processing_level),
            ("id", &self.id),
        ];
        for (name, value) in components {
            if value.is_empty() {
                return Err(EoError::InvalidMetadata(format!("{} is empty", name)));
            }
            if value.contains('/') {
                return Err(EoError::InvalidMetadata(format!(
                    "{} must not contain '/': {}",
                    name, value
                )));
            }
        }
        self.start_datetime()?;
        Ok(())
    }

    /// Key prefix shared by the single-file outputs of this product.
    ///
    /// Format: `{top}/{platform}/{instrument}/{level}/{yyyy}/{mm}/{id}/{yyyymmdd}`
    pub fn product_path(&self) -> EoResult<String> {
        let dt = self.start_datetime()?;
        Ok(join_key(&[
            &self.top_level_directory,
            &self.platform,
            &self.instrument,
            &self.processing_level,
            &dt.format("%Y").to_string(),
            &dt.format("%m").to_string(),
            &self.id,
            &dt.format("%Y%m%d").to_string(),
        ]))
    }
}

/// Join key segments with `/`, skipping empty ones and stray separators.
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProductMetadata {
        ProductMetadata {
            top_level_directory: "eo".to_string(),
            platform: "SENTINEL-3".to_string(),
            instrument: "OLCI".to_string(),
            processing_level: "LEVEL2".to_string(),
            start_time: "2022-03-01T10:15:30.123456Z".to_string(),
            id: "S3A_OL_2_WFR".to_string(),
            relative_orbit_number: 123,
            platform_serial_identifier: "S3A".to_string(),
            title: "S3A_OL_2_WFR____20220301T101530".to_string(),
            source_product: None,
        }
    }

    #[test]
    fn test_product_path() {
        assert_eq!(
            sample().product_path().unwrap(),
            "eo/SENTINEL-3/OLCI/LEVEL2/2022/03/S3A_OL_2_WFR/20220301"
        );
    }

    #[test]
    fn test_validate_rejects_separator() {
        let mut meta = sample();
        meta.id = "a/b".to_string();
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_deserialize_catalogue_names() {
        let json = serde_json::json!({
            "top_level_directory": "eo",
            "platform": "SENTINEL-3",
            "instrument": "OLCI",
            "processingLevel": "LEVEL2",
            "startTimeFromAscendingNode": "2022-03-01T10:15:30.123456Z",
            "id": "S3A_OL_2_WFR",
            "relativeOrbitNumber": 123,
            "platformSerialIdentifier": "S3A"
        });
        let meta: ProductMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.relative_orbit_number, 123);
        assert!(meta.title.is_empty());
    }

    #[test]
    fn test_join_key_skips_empty() {
        assert_eq!(join_key(&["", "a/", "/b", "c"]), "a/b/c");
    }
}
