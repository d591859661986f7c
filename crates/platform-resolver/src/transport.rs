//! Typed S3 transport options.
//!
//! Profiles describe client transport settings either as a mapping or as an
//! inline `key=value, key=value` string. Both forms go through the same
//! enumerated option parser; nothing in a profile is ever evaluated.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};

/// S3 request addressing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// Let the client decide.
    #[default]
    Auto,
    /// `https://endpoint/bucket/key`
    Path,
    /// `https://bucket.endpoint/key`
    Virtual,
}

impl AddressingStyle {
    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "path" => Ok(Self::Path),
            "virtual" => Ok(Self::Virtual),
            other => Err(PlatformError::transport(
                "addressing_style",
                format!("expected path, virtual or auto, got '{}'", other),
            )),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Path => "path",
            Self::Virtual => "virtual",
        }
    }
}

/// Client transport configuration for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Request signature version, e.g. `s3v4`.
    pub signature_version: Option<String>,
    pub addressing_style: AddressingStyle,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    /// Force plain HTTP on or off; derived from the endpoint scheme when unset.
    pub allow_http: Option<bool>,
}

impl TransportConfig {
    /// Parse the inline form, e.g. `signature_version=s3v4, addressing_style=path`.
    ///
    /// A surrounding `Config(...)` wrapper and quoted values are accepted so
    /// that older profiles keep loading.
    pub fn parse_inline(s: &str) -> Result<Self> {
        let mut config = Self::default();

        let mut body = s.trim();
        if let Some(inner) = body
            .strip_prefix("Config(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            body = inner;
        }

        for pair in body.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                PlatformError::transport(pair, "expected key=value".to_string())
            })?;
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            config.set_option(key.trim(), value)?;
        }

        Ok(config)
    }

    /// Build from a YAML value: null, an inline string or a mapping.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self> {
        match value {
            serde_yaml::Value::Null => Ok(Self::default()),
            serde_yaml::Value::String(s) => Self::parse_inline(s),
            serde_yaml::Value::Mapping(map) => {
                let mut config = Self::default();
                for (key, value) in map {
                    let key = key.as_str().ok_or_else(|| {
                        PlatformError::transport(format!("{:?}", key), "key must be a string")
                    })?;
                    let value = scalar_to_string(value)
                        .ok_or_else(|| PlatformError::transport(key, "value must be a scalar"))?;
                    config.set_option(key, &value)?;
                }
                Ok(config)
            }
            other => Err(PlatformError::transport(
                "transport",
                format!("expected a string or mapping, got {:?}", other),
            )),
        }
    }

    /// Apply one enumerated option.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "signature_version" => self.signature_version = Some(value.to_string()),
            "addressing_style" => self.addressing_style = AddressingStyle::parse(value)?,
            "connect_timeout_secs" | "connect_timeout" => {
                self.connect_timeout_secs = Some(parse_number(key, value)?)
            }
            "read_timeout_secs" | "read_timeout" => {
                self.read_timeout_secs = Some(parse_number(key, value)?)
            }
            "max_attempts" => self.max_attempts = Some(parse_number(key, value)?),
            "allow_http" => self.allow_http = Some(parse_bool(key, value)?),
            unknown => {
                return Err(PlatformError::transport(unknown, "unknown option"));
            }
        }
        Ok(())
    }

    /// Render the options back into the inline form.
    pub fn to_inline(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = &self.signature_version {
            parts.push(format!("signature_version={}", v));
        }
        if self.addressing_style != AddressingStyle::Auto {
            parts.push(format!("addressing_style={}", self.addressing_style.as_str()));
        }
        if let Some(v) = self.connect_timeout_secs {
            parts.push(format!("connect_timeout_secs={}", v));
        }
        if let Some(v) = self.read_timeout_secs {
            parts.push(format!("read_timeout_secs={}", v));
        }
        if let Some(v) = self.max_attempts {
            parts.push(format!("max_attempts={}", v));
        }
        if let Some(v) = self.allow_http {
            parts.push(format!("allow_http={}", v));
        }
        parts.join(", ")
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_inline())
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| PlatformError::transport(key, format!("expected a number, got '{}'", value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PlatformError::transport(
            key,
            format!("expected a boolean, got '{}'", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline() {
        let config =
            TransportConfig::parse_inline("signature_version=s3v4, addressing_style=path").unwrap();
        assert_eq!(config.signature_version.as_deref(), Some("s3v4"));
        assert_eq!(config.addressing_style, AddressingStyle::Path);
    }

    #[test]
    fn test_parse_legacy_wrapper() {
        let config = TransportConfig::parse_inline("Config(signature_version='s3v4')").unwrap();
        assert_eq!(config.signature_version.as_deref(), Some("s3v4"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = TransportConfig::parse_inline("__import__=os").unwrap_err();
        assert!(matches!(err, PlatformError::InvalidTransportOption { .. }));
    }

    #[test]
    fn test_malformed_value_rejected() {
        assert!(TransportConfig::parse_inline("max_attempts=many").is_err());
        assert!(TransportConfig::parse_inline("addressing_style=sideways").is_err());
        assert!(TransportConfig::parse_inline("signature_version").is_err());
    }

    #[test]
    fn test_from_yaml_mapping() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("max_attempts: 3\nallow_http: true\n").unwrap();
        let config = TransportConfig::from_yaml(&value).unwrap();
        assert_eq!(config.max_attempts, Some(3));
        assert_eq!(config.allow_http, Some(true));
    }

    #[test]
    fn test_inline_roundtrip() {
        let config = TransportConfig {
            signature_version: Some("s3v4".to_string()),
            addressing_style: AddressingStyle::Virtual,
            read_timeout_secs: Some(30),
            ..Default::default()
        };
        assert_eq!(TransportConfig::parse_inline(&config.to_inline()).unwrap(), config);
    }
}
