//! Timestamp parsing and integer encoding for acquisition times.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{EoError, EoResult};

/// Naive formats tried after RFC 3339, all interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    // Catalogue style, e.g. 2022-03-01T10:15:30.123456Z
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    // Scene header style, e.g. 01-Mar-2022 10:15:30.123456
    "%d-%b-%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse an acquisition timestamp.
///
/// Accepts RFC 3339 and the naive formats found in product catalogues
/// and scene headers.
pub fn parse_timestamp(s: &str) -> EoResult<DateTime<Utc>> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(EoError::InvalidTimestamp(s.to_string()))
}

/// Encode a timestamp as integer nanoseconds since the Unix epoch.
///
/// Sub-nanosecond precision does not exist in the input, so the only loss is
/// the calendar representation itself. Ordering is preserved.
pub fn to_epoch_nanos(dt: &DateTime<Utc>) -> EoResult<i64> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| EoError::TimestampOutOfRange(dt.to_rfc3339()))
}

/// Decode integer nanoseconds since the Unix epoch.
pub fn from_epoch_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_nanos(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2022-03-01T10:15:30Z").unwrap();
        assert_eq!(dt.year(), 2022);
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_catalogue_format() {
        let dt = parse_timestamp("2022-03-01T10:15:30.123456Z").unwrap();
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_scene_header_format() {
        let dt = parse_timestamp("01-Mar-2022 10:15:30.500000").unwrap();
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.second(), 30);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_epoch_nanos_preserves_order() {
        let a = parse_timestamp("2022-03-01T10:15:30Z").unwrap();
        let b = parse_timestamp("2022-03-02T10:15:30Z").unwrap();
        let na = to_epoch_nanos(&a).unwrap();
        let nb = to_epoch_nanos(&b).unwrap();
        assert!(na < nb);
        assert_eq!(from_epoch_nanos(na), a);
    }
}
