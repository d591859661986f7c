//! Storage platform resolution.
//!
//! A deployment can run on several storage platforms (a cloud provider's
//! object store, an on-premise MinIO, ...). Each platform is described by a
//! YAML profile with a priority. At runtime this crate decides:
//!
//! - the **source** platform: the canonical data source, chosen by override
//!   or by highest priority;
//! - the **sink** platform: the highest-priority platform whose same-network
//!   endpoint is reachable from the current process.
//!
//! ```text
//! ~/eoconfig/config_eo_service*.yml
//!      │
//!      ▼
//! PlatformRegistry (priority desc, load order on ties)
//!      │
//!      ├─► source: cache override │ highest priority
//!      │
//!      ├─► sink:   cache override │ first candidate passing the probe
//!      │
//!      ▼
//! ResolvedConfiguration (sink fields, overridden by source fields)
//! ```
//!
//! Both choices are memoized in a [`ResolutionCache`] owned by the caller.

pub mod cache;
pub mod error;
pub mod loader;
pub mod probe;
pub mod profile;
pub mod registry;
pub mod resolver;
pub mod transport;

pub use cache::{ResolutionCache, LOCAL_PLATFORM_ENV, SOURCE_PLATFORM_ENV};
pub use error::{PlatformError, Result};
pub use loader::{config_dir, load_profile_file, load_profiles_from_dir};
pub use probe::{HttpProbe, Reachability, ReachabilityProbe, PROBE_TIMEOUT};
pub use profile::{Credentials, PlatformProfile, ProbePolicy, SharedSettings};
pub use registry::PlatformRegistry;
pub use resolver::{PlatformResolver, ResolvedConfiguration};
pub use transport::{AddressingStyle, TransportConfig};
