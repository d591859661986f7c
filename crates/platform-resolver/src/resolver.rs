//! Source and sink platform resolution.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use storage::ObjectStorageConfig;

use crate::cache::ResolutionCache;
use crate::error::{PlatformError, Result};
use crate::probe::{Reachability, ReachabilityProbe};
use crate::profile::{PlatformProfile, ProbePolicy};
use crate::registry::PlatformRegistry;
use crate::transport::{AddressingStyle, TransportConfig};

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfiguration {
    /// Canonical data source.
    pub source: PlatformProfile,
    /// Reachable platform that receives writes.
    pub sink: PlatformProfile,
    /// Sink fields overridden by source fields.
    pub fields: BTreeMap<String, String>,
}

impl ResolvedConfiguration {
    /// Merge: sink fields are the base, source fields win on collision.
    pub fn merge(source: PlatformProfile, sink: PlatformProfile) -> Self {
        let mut fields = sink.fields();
        fields.extend(source.fields());
        Self {
            source,
            sink,
            fields,
        }
    }

    /// A merged field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Object storage settings for writing.
    ///
    /// The endpoint is the sink's same-network endpoint; bucket, region,
    /// credentials and transport come from the merged field set, so the
    /// source platform's values apply when both platforms define them.
    pub fn storage_settings(&self) -> Result<ObjectStorageConfig> {
        let transport = match self.field("transport") {
            Some(inline) => TransportConfig::parse_inline(inline)?,
            None => TransportConfig::default(),
        };
        let merged = |key: &str| self.field(key).unwrap_or_default().to_string();

        Ok(storage_config(
            &self.sink.sink_endpoint,
            merged("bucket"),
            merged("aws_access_key_id"),
            merged("aws_secret_access_key"),
            merged("region_name"),
            &transport,
        ))
    }

    /// Object storage settings for reading from the source platform externally.
    pub fn source_storage_settings(&self) -> ObjectStorageConfig {
        storage_config(
            &self.source.source_endpoint,
            self.source.bucket.clone(),
            self.source.credentials.access_key_id.clone(),
            self.source.credentials.secret_access_key.clone(),
            self.source.region.clone(),
            &self.source.transport,
        )
    }
}

fn storage_config(
    endpoint: &str,
    bucket: String,
    access_key_id: String,
    secret_access_key: String,
    region: String,
    transport: &TransportConfig,
) -> ObjectStorageConfig {
    ObjectStorageConfig {
        endpoint: endpoint.to_string(),
        bucket,
        access_key_id,
        secret_access_key,
        region,
        allow_http: transport
            .allow_http
            .unwrap_or_else(|| endpoint.starts_with("http://")),
        virtual_hosted_style: transport.addressing_style == AddressingStyle::Virtual,
    }
}

/// Resolves source and sink platforms from a registry.
pub struct PlatformResolver<P: ReachabilityProbe> {
    registry: PlatformRegistry,
    probe: P,
}

impl<P: ReachabilityProbe> PlatformResolver<P> {
    pub fn new(registry: PlatformRegistry, probe: P) -> Self {
        Self { registry, probe }
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Resolve both platforms and merge their settings.
    ///
    /// Fails with [`PlatformError::PlatformUnavailable`] when no candidate is
    /// reachable. There is no retry.
    #[instrument(skip_all, fields(candidates = self.registry.len()))]
    pub async fn resolve(&self, cache: &mut ResolutionCache) -> Result<ResolvedConfiguration> {
        let source = self.resolve_source(cache)?.clone();
        let sink = self.resolve_sink(cache).await?.clone();

        info!(source = %source.name, sink = %sink.name, "Resolved storage platforms");
        Ok(ResolvedConfiguration::merge(source, sink))
    }

    /// The canonical source platform: the cached choice if it names a known
    /// profile, otherwise the highest-priority profile (recorded in the cache).
    pub fn resolve_source(&self, cache: &mut ResolutionCache) -> Result<&PlatformProfile> {
        if let Some(name) = cache.source.as_deref() {
            match self.registry.get(name) {
                Some(profile) => return Ok(profile),
                None => warn!(platform = %name, "Cached source platform is not a known profile"),
            }
        }

        let profile = self
            .registry
            .highest_priority()
            .ok_or_else(|| PlatformError::NoProfiles("registry".to_string()))?;
        cache.source = Some(profile.name.clone());
        Ok(profile)
    }

    /// The first platform, in priority order, reachable from this process.
    ///
    /// A cached sink naming a known profile is trusted without probing, which
    /// keeps repeated resolutions stable.
    pub async fn resolve_sink(&self, cache: &mut ResolutionCache) -> Result<&PlatformProfile> {
        if let Some(name) = cache.sink.as_deref() {
            match self.registry.get(name) {
                Some(profile) if profile.probe != ProbePolicy::Never => {
                    debug!(platform = %name, "Using cached sink platform");
                    return Ok(profile);
                }
                _ => warn!(platform = %name, "Ignoring cached sink platform"),
            }
        }

        let mut tried = Vec::new();
        let mut found = None;

        for candidate in self.registry.iter() {
            let reachability = match candidate.probe {
                ProbePolicy::Never => {
                    debug!(platform = %candidate.name, "Skipping platform excluded as sink");
                    continue;
                }
                ProbePolicy::Always => Reachability::Reachable,
                ProbePolicy::Http => self.probe.probe(candidate).await,
            };

            tried.push(candidate.name.clone());
            match reachability {
                Reachability::Reachable => {
                    found = Some(candidate);
                    break;
                }
                Reachability::Unreachable { reason } => {
                    warn!(platform = %candidate.name, reason = %reason, "Platform unreachable");
                }
            }
        }

        match found {
            Some(profile) => {
                cache.sink = Some(profile.name.clone());
                Ok(profile)
            }
            None => Err(PlatformError::PlatformUnavailable { tried }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::fixtures::profile;

    #[test]
    fn test_merge_source_wins() {
        let source = profile("source", 10);
        let mut sink = profile("sink", 5);
        sink.output_directory = Some("/sink/out".to_string());

        let resolved = ResolvedConfiguration::merge(source, sink);
        assert_eq!(resolved.field("bucket"), Some("source-bucket"));
        assert_eq!(resolved.field("aws_access_key_id"), Some("source-key"));
        // Only the sink defines it, so it survives the merge.
        assert_eq!(resolved.field("output_directory"), Some("/sink/out"));
    }

    #[test]
    fn test_storage_settings_use_sink_endpoint() {
        let resolved = ResolvedConfiguration::merge(profile("source", 10), profile("sink", 5));
        let settings = resolved.storage_settings().unwrap();

        assert_eq!(settings.endpoint, "http://sink.local:9000");
        assert_eq!(settings.bucket, "source-bucket");
        assert!(settings.allow_http);
        assert!(!settings.virtual_hosted_style);
    }

    #[test]
    fn test_source_storage_settings_use_external_endpoint() {
        let resolved = ResolvedConfiguration::merge(profile("source", 10), profile("sink", 5));
        let settings = resolved.source_storage_settings();
        assert_eq!(settings.endpoint, "https://source.example.com");
        assert!(!settings.allow_http);
    }
}
