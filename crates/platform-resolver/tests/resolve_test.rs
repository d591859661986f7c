//! End-to-end platform resolution tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use platform_resolver::{
    HttpProbe, PlatformError, PlatformProfile, PlatformRegistry, PlatformResolver, Reachability,
    ReachabilityProbe, ResolutionCache,
};

/// Probe answering from a fixed set of reachable platform names.
struct FakeProbe {
    reachable: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeProbe {
    fn new(reachable: &[&str]) -> Self {
        Self {
            reachable: reachable.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn probe(&self, profile: &PlatformProfile) -> Reachability {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reachable.contains(&profile.name) {
            Reachability::Reachable
        } else {
            Reachability::Unreachable {
                reason: "connection refused".to_string(),
            }
        }
    }
}

fn write_profile(dir: &Path, name: &str, priority: i64, endpoint: &str, extra: &str) {
    let content = format!(
        r#"{name}:
  priority: {priority}
  storage:
    region_name: eu-central-1
    endpoint_url_local: {endpoint}
    endpoint_url_ext: https://{name}.example.com
    aws_access_key_id: {name}-key
    aws_secret_access_key: {name}-secret
    bucket: {name}-bucket
{extra}"#
    );
    std::fs::write(dir.join(format!("config_eo_service_{}.yml", name)), content).unwrap();
}

fn two_site_registry() -> (tempfile::TempDir, PlatformRegistry) {
    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path(), "site-a", 10, "http://site-a.local:9000", "");
    write_profile(dir.path(), "site-b", 5, "http://site-b.local:9000", "");
    let registry = PlatformRegistry::load_dir(dir.path()).unwrap();
    (dir, registry)
}

#[tokio::test]
async fn test_sink_falls_back_to_reachable_platform() {
    let (_dir, registry) = two_site_registry();
    let resolver = PlatformResolver::new(registry, FakeProbe::new(&["site-b"]));
    let mut cache = ResolutionCache::new();

    let resolved = resolver.resolve(&mut cache).await.unwrap();

    assert_eq!(resolved.source.name, "site-a");
    assert_eq!(resolved.sink.name, "site-b");
    assert_eq!(cache.source.as_deref(), Some("site-a"));
    assert_eq!(cache.sink.as_deref(), Some("site-b"));

    // Source fields override the sink's on collision; the endpoint is the sink's.
    assert_eq!(resolved.field("bucket"), Some("site-a-bucket"));
    let settings = resolved.storage_settings().unwrap();
    assert_eq!(settings.endpoint, "http://site-b.local:9000");
    assert_eq!(settings.bucket, "site-a-bucket");
    assert_eq!(settings.region, "eu-central-1");
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let (_dir, registry) = two_site_registry();
    let resolver = PlatformResolver::new(registry, FakeProbe::new(&["site-b"]));
    let mut cache = ResolutionCache::new();

    let first = resolver.resolve(&mut cache).await.unwrap();
    let probes_after_first = resolver.probe().calls();
    let second = resolver.resolve(&mut cache).await.unwrap();

    assert_eq!(first, second);
    // The cached sink is trusted, nothing is probed again.
    assert_eq!(resolver.probe().calls(), probes_after_first);
}

#[tokio::test]
async fn test_all_unreachable_is_platform_unavailable() {
    let (_dir, registry) = two_site_registry();
    let resolver = PlatformResolver::new(registry, FakeProbe::new(&[]));
    let mut cache = ResolutionCache::new();

    let err = resolver.resolve(&mut cache).await.unwrap_err();
    match err {
        PlatformError::PlatformUnavailable { tried } => {
            assert_eq!(tried, vec!["site-a".to_string(), "site-b".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(cache.sink.is_none());
}

#[tokio::test]
async fn test_probe_policies() {
    let dir = tempfile::tempdir().unwrap();
    write_profile(
        dir.path(),
        "archive",
        20,
        "http://archive.local:9000",
        "    probe: never\n",
    );
    write_profile(
        dir.path(),
        "dev",
        1,
        "http://localhost:9000",
        "    probe: always\n",
    );
    let registry = PlatformRegistry::load_dir(dir.path()).unwrap();
    let resolver = PlatformResolver::new(registry, FakeProbe::new(&[]));
    let mut cache = ResolutionCache::new();

    let resolved = resolver.resolve(&mut cache).await.unwrap();
    assert_eq!(resolved.source.name, "archive");
    assert_eq!(resolved.sink.name, "dev");
    assert_eq!(resolver.probe().calls(), 0);
}

#[tokio::test]
async fn test_cached_source_override_is_honoured() {
    let (_dir, registry) = two_site_registry();
    let resolver = PlatformResolver::new(registry, FakeProbe::new(&["site-a"]));
    let mut cache = ResolutionCache {
        source: Some("site-b".to_string()),
        sink: None,
    };

    let resolved = resolver.resolve(&mut cache).await.unwrap();
    assert_eq!(resolved.source.name, "site-b");
    assert_eq!(resolved.sink.name, "site-a");
    assert_eq!(resolved.field("bucket"), Some("site-b-bucket"));
}

#[tokio::test]
async fn test_unknown_cached_sink_is_reprobed() {
    let (_dir, registry) = two_site_registry();
    let resolver = PlatformResolver::new(registry, FakeProbe::new(&["site-a"]));
    let mut cache = ResolutionCache {
        source: None,
        sink: Some("decommissioned".to_string()),
    };

    let resolved = resolver.resolve(&mut cache).await.unwrap();
    assert_eq!(resolved.sink.name, "site-a");
    assert_eq!(cache.sink.as_deref(), Some("site-a"));
}

/// Serve one HTTP error response per connection.
async fn spawn_forbidden_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        }
    });

    format!("http://{}", addr)
}

async fn closed_port_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_probe_error_status_is_reachable() {
    let endpoint = spawn_forbidden_server().await;
    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path(), "minio", 1, &endpoint, "");
    let registry = PlatformRegistry::load_dir(dir.path()).unwrap();

    let probe = HttpProbe::with_timeout(Duration::from_secs(2)).unwrap();
    let reachability = probe.probe(registry.get("minio").unwrap()).await;
    assert!(reachability.is_reachable());
}

#[tokio::test]
async fn test_http_probe_resolves_against_live_and_dead_endpoints() {
    let live = spawn_forbidden_server().await;
    let dead = closed_port_endpoint().await;

    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path(), "remote", 10, &dead, "");
    write_profile(dir.path(), "local", 5, &live, "");
    let registry = PlatformRegistry::load_dir(dir.path()).unwrap();

    let unreachable = HttpProbe::new()
        .unwrap()
        .probe(registry.get("remote").unwrap())
        .await;
    assert!(!unreachable.is_reachable());

    let resolver = PlatformResolver::new(registry, HttpProbe::new().unwrap());
    let mut cache = ResolutionCache::new();
    let resolved = resolver.resolve(&mut cache).await.unwrap();

    assert_eq!(resolved.source.name, "remote");
    assert_eq!(resolved.sink.name, "local");
    assert_eq!(resolved.storage_settings().unwrap().endpoint, live);
}
