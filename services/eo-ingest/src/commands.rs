//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use object_store::local::LocalFileSystem;
use tracing::info;

use datacube::{
    create_s3_storage, DataCube, DatacubeConfig, DatacubeWriter, OutputWriter, WriterKind,
    ZarrArrayStore,
};
use eo_common::ProductMetadata;
use platform_resolver::{
    HttpProbe, PlatformRegistry, PlatformResolver, ResolutionCache, ResolvedConfiguration,
};
use storage::ObjectStorage;

/// Arguments of `write`.
#[derive(Debug)]
pub struct WriteRequest {
    pub dataset: PathBuf,
    pub metadata: PathBuf,
    pub kind: String,
    pub variable: Option<String>,
    pub store_dir: Option<PathBuf>,
}

/// Load the profiles and resolve this host's platforms.
async fn resolve_platforms(config_dir: &Path) -> Result<ResolvedConfiguration> {
    let registry = PlatformRegistry::load_dir(config_dir)
        .with_context(|| format!("loading profiles from {}", config_dir.display()))?;
    let resolver = PlatformResolver::new(registry, HttpProbe::new()?);

    let mut cache = ResolutionCache::from_env();
    let resolved = resolver.resolve(&mut cache).await?;
    cache.persist_to_env();
    Ok(resolved)
}

pub async fn resolve(config_dir: &Path) -> Result<()> {
    let resolved = resolve_platforms(config_dir).await?;
    let settings = resolved.storage_settings()?;

    println!("source:   {}", resolved.source.name);
    println!("sink:     {}", resolved.sink.name);
    println!("endpoint: {}", settings.endpoint);
    println!("bucket:   {}", settings.bucket);
    Ok(())
}

pub async fn write(config_dir: &Path, request: WriteRequest) -> Result<()> {
    let cube: DataCube = read_json(&request.dataset)?;
    let meta: ProductMetadata = read_json(&request.metadata)?;

    let kind = match WriterKind::from_str(&request.kind) {
        Some(WriterKind::Raster { .. }) => WriterKind::Raster {
            variable: request.variable.clone(),
        },
        Some(kind) => kind,
        None => return Err(anyhow!("unknown output kind '{}'", request.kind)),
    };

    let config = DatacubeConfig::from_env();
    config.validate().map_err(|e| anyhow!(e))?;

    let (objects, store) = match &request.store_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let local = LocalFileSystem::new_with_prefix(dir)?;
            let objects = ObjectStorage::from_store(Arc::new(local), dir.display().to_string());
            (objects, ZarrArrayStore::filesystem(dir, config.clone())?)
        }
        None => {
            let resolved = resolve_platforms(config_dir).await?;
            let settings = resolved.storage_settings()?;
            info!(
                sink = %resolved.sink.name,
                bucket = %settings.bucket,
                "Writing to resolved platform"
            );
            let objects = ObjectStorage::new(&settings)?;
            let store = ZarrArrayStore::new(create_s3_storage(&settings)?, config.clone());
            (objects, store)
        }
    };

    let writer = OutputWriter::new(objects, DatacubeWriter::from_config(store, &config));
    let location = writer.write(kind, cube, &meta).await?;
    println!("{}", location);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let body = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&body).with_context(|| format!("parsing {}", path.display()))
}
