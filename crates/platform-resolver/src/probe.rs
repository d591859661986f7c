//! Reachability probing of sink endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{PlatformError, Result};
use crate::profile::PlatformProfile;

/// Bound on a single reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of probing one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    Unreachable { reason: String },
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable)
    }
}

/// Decides whether the current process can reach a platform's sink endpoint.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, profile: &PlatformProfile) -> Reachability;
}

/// HTTP probe against the sink endpoint.
///
/// Any HTTP response counts as reachable, including error statuses: the
/// endpoint exists and answered. Connection failures and timeouts count as
/// unreachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Probe with the default 2 second bound.
    pub fn new() -> Result<Self> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Probe(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    #[instrument(skip(self, profile), fields(platform = %profile.name, endpoint = %profile.sink_endpoint))]
    async fn probe(&self, profile: &PlatformProfile) -> Reachability {
        match self.client.get(&profile.sink_endpoint).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "Endpoint answered");
                Reachability::Reachable
            }
            Err(e) => {
                debug!(error = %e, "Endpoint unreachable");
                Reachability::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }
}
