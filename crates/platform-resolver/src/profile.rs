//! Storage platform profiles.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::transport::TransportConfig;

/// How to decide whether a platform's sink endpoint is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbePolicy {
    /// Issue a bounded-timeout HTTP request against the sink endpoint.
    #[default]
    Http,
    /// Treat as reachable without probing (local development stores).
    Always,
    /// Never use this platform as a sink.
    Never,
}

/// Object store credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// Credentials of the imagery API shared by every platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSettings {
    pub sh_instance_id: Option<String>,
    pub sh_client_id: Option<String>,
    pub sh_client_secret: Option<String>,
}

/// One deployment platform, as loaded from its profile file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformProfile {
    pub name: String,
    /// Higher is preferred.
    pub priority: i64,
    pub bucket: String,
    /// Same-network endpoint, used for writes and the reachability probe.
    pub sink_endpoint: String,
    /// External endpoint, used to read from this platform from elsewhere.
    pub source_endpoint: String,
    pub credentials: Credentials,
    pub region: String,
    pub probe: ProbePolicy,
    pub transport: TransportConfig,
    pub output_directory: Option<String>,
    pub shared: SharedSettings,
    /// File the profile was loaded from.
    pub origin: PathBuf,
}

impl PlatformProfile {
    /// Flatten the profile into the field set used for configuration merging.
    ///
    /// Optional values that are unset are omitted, so they never override the
    /// other platform's values during a merge.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("platform".to_string(), self.name.clone());
        fields.insert("priority".to_string(), self.priority.to_string());
        fields.insert("filename".to_string(), self.origin.display().to_string());
        fields.insert("bucket".to_string(), self.bucket.clone());
        fields.insert("endpoint_url_local".to_string(), self.sink_endpoint.clone());
        fields.insert("endpoint_url_ext".to_string(), self.source_endpoint.clone());
        fields.insert("region_name".to_string(), self.region.clone());
        fields.insert(
            "aws_access_key_id".to_string(),
            self.credentials.access_key_id.clone(),
        );
        fields.insert(
            "aws_secret_access_key".to_string(),
            self.credentials.secret_access_key.clone(),
        );
        fields.insert("transport".to_string(), self.transport.to_inline());

        let optional = [
            ("output_directory", &self.output_directory),
            ("sh_instance_id", &self.shared.sh_instance_id),
            ("sh_client_id", &self.shared.sh_client_id),
            ("sh_client_secret", &self.shared.sh_client_secret),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                fields.insert(key.to_string(), value.clone());
            }
        }

        fields
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A minimal profile for tests.
    pub fn profile(name: &str, priority: i64) -> PlatformProfile {
        PlatformProfile {
            name: name.to_string(),
            priority,
            bucket: format!("{}-bucket", name),
            sink_endpoint: format!("http://{}.local:9000", name),
            source_endpoint: format!("https://{}.example.com", name),
            credentials: Credentials {
                access_key_id: format!("{}-key", name),
                secret_access_key: format!("{}-secret", name),
            },
            region: "us-east-1".to_string(),
            probe: ProbePolicy::Http,
            transport: TransportConfig::default(),
            output_directory: None,
            shared: SharedSettings::default(),
            origin: PathBuf::from(format!("config_eo_service_{}.yml", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::profile;

    #[test]
    fn test_fields_omit_unset_optionals() {
        let fields = profile("site-a", 10).fields();
        assert_eq!(fields["platform"], "site-a");
        assert_eq!(fields["bucket"], "site-a-bucket");
        assert!(!fields.contains_key("output_directory"));
        assert!(!fields.contains_key("sh_client_id"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", profile("site-a", 10).credentials);
        assert!(!rendered.contains("site-a-secret"));
    }
}
