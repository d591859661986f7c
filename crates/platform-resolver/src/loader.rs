//! Profile loader.
//!
//! Each platform has one YAML descriptor in the configuration directory:
//!
//! ```yaml
//! creodias:
//!   priority: 10
//!   storage:
//!     region_name: RegionOne
//!     endpoint_url_local: http://data.cloud.local:8080
//!     endpoint_url_ext: https://s3.cloud.example.com
//!     aws_access_key_id: ${S3_ACCESS_KEY}
//!     aws_secret_access_key: ${S3_SECRET_KEY:-changeme}
//!     bucket: echoes
//!     transport: "signature_version=s3v4, addressing_style=path"
//! sentinel-hub:
//!   instance_id: ...
//!   sh_client_id: ...
//!   sh_client_secret: ...
//! ```
//!
//! Supports environment variable substitution using ${VAR} syntax.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PlatformError, Result};
use crate::profile::{Credentials, PlatformProfile, ProbePolicy, SharedSettings};
use crate::transport::TransportConfig;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "EO_CONFIG_DIR";

/// Default configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = "~/eoconfig";

/// File name prefix of platform descriptors.
pub const PROFILE_FILE_PREFIX: &str = "config_eo_service";

/// Key of the shared imagery API section.
const SHARED_SECTION: &str = "sentinel-hub";

#[derive(Debug, Deserialize)]
struct PlatformSection {
    priority: i64,
    storage: StorageSection,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    #[serde(default)]
    region_name: Option<String>,
    endpoint_url_local: String,
    endpoint_url_ext: String,
    aws_access_key_id: String,
    aws_secret_access_key: String,
    bucket: String,
    #[serde(default)]
    output_directory: Option<String>,
    #[serde(default)]
    probe: ProbePolicy,
    #[serde(default, alias = "config")]
    transport: serde_yaml::Value,
}

#[derive(Debug, Default, Deserialize)]
struct SharedSection {
    instance_id: Option<String>,
    sh_client_id: Option<String>,
    sh_client_secret: Option<String>,
}

/// Resolve the configuration directory (`EO_CONFIG_DIR` or `~/eoconfig`).
pub fn config_dir() -> PathBuf {
    let raw = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Load and parse one profile file with environment variable substitution.
pub fn load_profile_file<P: AsRef<Path>>(path: P) -> Result<PlatformProfile> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| PlatformError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let expanded = expand_env_vars(&content)?;
    parse_profile(&expanded, path)
}

/// Load all profile files from a directory, in file name order.
pub fn load_profiles_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<PlatformProfile>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| PlatformError::ConfigRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PlatformError::ConfigRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_profile_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut profiles = Vec::with_capacity(paths.len());
    for path in paths {
        let profile = load_profile_file(&path)?;
        debug!(platform = %profile.name, priority = profile.priority, path = ?path, "Loaded profile");
        profiles.push(profile);
    }

    info!(count = profiles.len(), dir = ?dir, "Loaded platform profiles");
    Ok(profiles)
}

fn is_profile_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.starts_with(PROFILE_FILE_PREFIX))
        .unwrap_or(false);
    let ext = path.extension().and_then(|s| s.to_str());
    name_matches && (ext == Some("yml") || ext == Some("yaml"))
}

/// Parse the (already expanded) YAML of one profile file.
fn parse_profile(content: &str, path: &Path) -> Result<PlatformProfile> {
    let parse_err = |e: serde_yaml::Error| PlatformError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let document: serde_yaml::Mapping = serde_yaml::from_str(content).map_err(parse_err)?;

    let mut platform: Option<(String, PlatformSection)> = None;
    let mut shared = SharedSection::default();

    for (key, value) in document {
        let key = key
            .as_str()
            .ok_or_else(|| PlatformError::invalid_profile(path, "top-level keys must be strings"))?
            .to_string();

        if key == SHARED_SECTION {
            shared = serde_yaml::from_value(value).map_err(parse_err)?;
            continue;
        }

        if let Some((existing, _)) = &platform {
            return Err(PlatformError::invalid_profile(
                path,
                format!("expected one platform per file, found '{}' and '{}'", existing, key),
            ));
        }
        let section: PlatformSection = serde_yaml::from_value(value).map_err(parse_err)?;
        platform = Some((key, section));
    }

    let (name, section) =
        platform.ok_or_else(|| PlatformError::invalid_profile(path, "no platform section"))?;
    let storage = section.storage;

    if storage.bucket.is_empty() {
        return Err(PlatformError::invalid_profile(path, "storage.bucket is empty"));
    }
    if storage.endpoint_url_local.is_empty() {
        return Err(PlatformError::invalid_profile(
            path,
            "storage.endpoint_url_local is empty",
        ));
    }

    Ok(PlatformProfile {
        name,
        priority: section.priority,
        bucket: storage.bucket,
        sink_endpoint: storage.endpoint_url_local,
        source_endpoint: storage.endpoint_url_ext,
        credentials: Credentials {
            access_key_id: storage.aws_access_key_id,
            secret_access_key: storage.aws_secret_access_key,
        },
        region: storage.region_name.unwrap_or_else(|| "us-east-1".to_string()),
        probe: storage.probe,
        transport: TransportConfig::from_yaml(&storage.transport)?,
        output_directory: storage.output_directory,
        shared: SharedSettings {
            sh_instance_id: shared.instance_id,
            sh_client_id: shared.sh_client_id,
            sh_client_secret: shared.sh_client_secret,
        },
        origin: path.to_path_buf(),
    })
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_expr.push(c);
            }
            if !closed {
                return Err(PlatformError::MissingVariable(format!(
                    "unclosed substitution ${{{}",
                    var_expr
                )));
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| PlatformError::MissingVariable(expr.to_string()))
    }
}
