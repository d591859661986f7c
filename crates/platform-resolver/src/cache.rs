//! Single-flight cache of resolved platform names.

/// Environment variable holding the chosen source platform name.
pub const SOURCE_PLATFORM_ENV: &str = "EO_SOURCE_PLATFORM";

/// Environment variable holding the confirmed sink (local) platform name.
pub const LOCAL_PLATFORM_ENV: &str = "EO_LOCAL_PLATFORM";

/// Memoized resolution results for one process.
///
/// The caller owns the cache and passes it to every resolution. It can be
/// seeded from and written back to the process environment so that child
/// processes skip re-probing; this is not safe across independent processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionCache {
    /// Chosen source platform name.
    pub source: Option<String>,
    /// Confirmed reachable sink platform name.
    pub sink: Option<String>,
}

impl ResolutionCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `EO_SOURCE_PLATFORM` / `EO_LOCAL_PLATFORM`.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            source: read(SOURCE_PLATFORM_ENV),
            sink: read(LOCAL_PLATFORM_ENV),
        }
    }

    /// Write known values back to the process environment.
    pub fn persist_to_env(&self) {
        if let Some(source) = &self.source {
            std::env::set_var(SOURCE_PLATFORM_ENV, source);
        }
        if let Some(sink) = &self.sink {
            std::env::set_var(LOCAL_PLATFORM_ENV, sink);
        }
    }

    /// Forget both choices; the next resolution probes again.
    pub fn reset(&mut self) {
        self.source = None;
        self.sink = None;
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.sink.is_none()
    }
}
