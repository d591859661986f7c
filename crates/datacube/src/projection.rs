//! Map projections used by target grids.
//!
//! Only the projections the datacube writer produces are supported: the
//! equidistant cylindrical (`eqc`) projection used by derived grids and plain
//! geographic coordinates. Proj strings are parsed by enumerated keys.

use crate::error::{DatacubeError, Result};

/// WGS84 semi-major axis (m).
pub const WGS84_A: f64 = 6_378_137.0;

/// Authalic sphere radius used by `+ellps=sphere` (m).
const SPHERE_R: f64 = 6_370_997.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Equidistant cylindrical on a sphere of `radius` metres.
    Equirectangular {
        lon_0: f64,
        lat_0: f64,
        lat_ts: f64,
        x_0: f64,
        y_0: f64,
        radius: f64,
    },
    /// Longitude/latitude in degrees.
    LongLat,
}

impl Projection {
    /// Parse a proj string such as `+proj=eqc +lat_ts=45 +lon_0=5 +ellps=WGS84 +units=m`.
    pub fn parse(proj_string: &str) -> Result<Self> {
        let mut name = None;
        let mut lon_0 = 0.0;
        let mut lat_0 = 0.0;
        let mut lat_ts = 0.0;
        let mut x_0 = 0.0;
        let mut y_0 = 0.0;
        let mut radius = None;
        let mut ellps_radius = WGS84_A;

        for token in proj_string.split_whitespace() {
            let token = token.trim_start_matches('+');
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, v),
                None => (token, ""),
            };
            match key {
                "proj" => name = Some(value.to_string()),
                "lon_0" => lon_0 = parse_param(key, value)?,
                "lat_0" => lat_0 = parse_param(key, value)?,
                "lat_ts" => lat_ts = parse_param(key, value)?,
                "x_0" => x_0 = parse_param(key, value)?,
                "y_0" => y_0 = parse_param(key, value)?,
                "R" | "a" => radius = Some(parse_param(key, value)?),
                "ellps" | "datum" => {
                    ellps_radius = match value.to_uppercase().as_str() {
                        "WGS84" | "GRS80" => WGS84_A,
                        "SPHERE" => SPHERE_R,
                        other => {
                            return Err(DatacubeError::UnsupportedProjection(format!(
                                "ellipsoid '{}'",
                                other
                            )))
                        }
                    }
                }
                // units, no_defs, type and friends carry no geometry
                _ => {}
            }
        }

        match name.as_deref() {
            Some("eqc") => Ok(Self::Equirectangular {
                lon_0,
                lat_0,
                lat_ts,
                x_0,
                y_0,
                radius: radius.unwrap_or(ellps_radius),
            }),
            Some("longlat") | Some("latlong") | Some("lonlat") | Some("latlon") => {
                Ok(Self::LongLat)
            }
            Some(other) => Err(DatacubeError::UnsupportedProjection(other.to_string())),
            None => Err(DatacubeError::UnsupportedProjection(format!(
                "no +proj in '{}'",
                proj_string
            ))),
        }
    }

    /// Equidistant cylindrical centred on a point, WGS84 radius.
    pub fn eqc_centred(lon_0: f64, lat_ts: f64) -> Self {
        Self::Equirectangular {
            lon_0,
            lat_0: 0.0,
            lat_ts,
            x_0: 0.0,
            y_0: 0.0,
            radius: WGS84_A,
        }
    }

    pub fn to_proj_string(&self) -> String {
        match self {
            Self::Equirectangular {
                lon_0,
                lat_0,
                lat_ts,
                x_0,
                y_0,
                radius,
            } => format!(
                "+proj=eqc +lat_ts={} +lat_0={} +lon_0={} +x_0={} +y_0={} +R={} +units=m +no_defs",
                lat_ts, lat_0, lon_0, x_0, y_0, radius
            ),
            Self::LongLat => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        }
    }

    /// Geographic degrees to projected coordinates.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        match *self {
            Self::Equirectangular {
                lon_0,
                lat_0,
                lat_ts,
                x_0,
                y_0,
                radius,
            } => {
                let dlon = wrap_longitude(lon - lon_0);
                let x = x_0 + radius * dlon.to_radians() * lat_ts.to_radians().cos();
                let y = y_0 + radius * (lat - lat_0).to_radians();
                (x, y)
            }
            Self::LongLat => (lon, lat),
        }
    }

    /// Projected coordinates to geographic degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Equirectangular {
                lon_0,
                lat_0,
                lat_ts,
                x_0,
                y_0,
                radius,
            } => {
                let lon = lon_0 + ((x - x_0) / (radius * lat_ts.to_radians().cos())).to_degrees();
                let lat = lat_0 + ((y - y_0) / radius).to_degrees();
                (wrap_longitude(lon), lat)
            }
            Self::LongLat => (x, y),
        }
    }
}

fn parse_param(key: &str, value: &str) -> Result<f64> {
    value.parse().map_err(|_| {
        DatacubeError::UnsupportedProjection(format!("bad value for +{}: '{}'", key, value))
    })
}

/// Normalize a longitude to [-180, 180).
pub(crate) fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eqc() {
        let proj = Projection::parse(
            "+proj=eqc +lat_ts=45 +lat_0=0 +lon_0=5 +x_0=0 +y_0=0 +ellps=WGS84 +units=m +no_defs",
        )
        .unwrap();
        match proj {
            Projection::Equirectangular {
                lon_0,
                lat_ts,
                radius,
                ..
            } => {
                assert_eq!(lon_0, 5.0);
                assert_eq!(lat_ts, 45.0);
                assert_eq!(radius, WGS84_A);
            }
            other => panic!("unexpected projection {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_projection() {
        assert!(matches!(
            Projection::parse("+proj=merc +lon_0=0"),
            Err(DatacubeError::UnsupportedProjection(_))
        ));
        assert!(Projection::parse("+units=m").is_err());
    }

    #[test]
    fn test_forward_inverse() {
        let proj = Projection::eqc_centred(10.0, 50.0);
        let (x, y) = proj.forward(10.5, 50.25);
        assert!(x > 0.0 && y > 0.0);

        let (lon, lat) = proj.inverse(x, y);
        assert!((lon - 10.5).abs() < 1e-9);
        assert!((lat - 50.25).abs() < 1e-9);
    }

    #[test]
    fn test_proj_string_roundtrip() {
        let proj = Projection::eqc_centred(-3.25, 12.5);
        assert_eq!(Projection::parse(&proj.to_proj_string()).unwrap(), proj);
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
    }
}
