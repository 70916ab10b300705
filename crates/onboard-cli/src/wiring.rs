//! Collaborator construction from CLI options.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use onboard_ai::{FieldTarget, VectorMatcher};
use onboard_core::{BlobSource, CollaboratorError, FormService, PrefillGenerator, SemanticMatcher};
use onboard_pipeline::PipelineConfig;
use onboard_store::{CatalogStore, LegacyStore, MemoryStore, SiteStore};
use onboard_sync::{
    FsBlobSource, HttpBlobSource, HttpEmbedder, HttpFormService, HttpMatcher, HttpPrefillGenerator,
    SyncClient,
};
use tracing::{info, warn};

use crate::GlobalOpts;

pub struct Stores {
    pub sites: Arc<dyn SiteStore>,
    pub legacy: Arc<dyn LegacyStore>,
    pub catalogs: Arc<dyn CatalogStore>,
}

impl Stores {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: SiteStore + LegacyStore + CatalogStore + 'static,
    {
        Self {
            sites: store.clone(),
            legacy: store.clone(),
            catalogs: store,
        }
    }
}

pub fn open_stores(db: Option<&Path>) -> anyhow::Result<Stores> {
    match db {
        Some(path) => open_db(path),
        None => {
            warn!("no database configured; state is kept in memory for this run");
            Ok(Stores::shared(Arc::new(MemoryStore::new())))
        }
    }
}

#[cfg(feature = "duckdb")]
fn open_db(path: &Path) -> anyhow::Result<Stores> {
    let store = onboard_store::DuckStore::open_persistent(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    info!(path = %path.display(), "opened database");
    Ok(Stores::shared(Arc::new(store)))
}

#[cfg(not(feature = "duckdb"))]
fn open_db(path: &Path) -> anyhow::Result<Stores> {
    anyhow::bail!(
        "database {} requested, but this build has no `duckdb` feature",
        path.display()
    )
}

pub fn timeout(opts: &GlobalOpts) -> Duration {
    Duration::from_secs(opts.http_timeout_secs)
}

fn client(url: &str, timeout: Duration) -> anyhow::Result<SyncClient> {
    SyncClient::with_timeout(url.to_string(), timeout)
        .with_context(|| format!("building HTTP client for {url}"))
}

pub fn form_service(url: Option<&str>, timeout: Duration) -> anyhow::Result<Arc<dyn FormService>> {
    let url = url.context("form service URL is required (--form-url or ONBOARD_FORM_URL)")?;
    Ok(Arc::new(HttpFormService::new(client(url, timeout)?)))
}

pub fn prefill_generator(
    url: Option<&str>,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn PrefillGenerator>> {
    let url = url.context("prefill service URL is required (--prefill-url or ONBOARD_PREFILL_URL)")?;
    Ok(Arc::new(HttpPrefillGenerator::new(client(url, timeout)?)))
}

/// Remote matcher when configured, otherwise the local vector matcher.
pub fn matcher(opts: &GlobalOpts, config: &PipelineConfig) -> anyhow::Result<Arc<dyn SemanticMatcher>> {
    let timeout = timeout(opts);
    if let Some(url) = &opts.matcher_url {
        info!(url = %url, "using remote semantic matcher");
        return Ok(Arc::new(HttpMatcher::new(client(url, timeout)?)));
    }
    let (Some(embed_url), Some(fields)) = (&opts.embed_url, &opts.fields) else {
        anyhow::bail!(
            "no semantic matcher configured: set --matcher-url, or --embed-url with --fields"
        );
    };
    let text = std::fs::read_to_string(fields)
        .with_context(|| format!("reading field targets {}", fields.display()))?;
    let targets: Vec<FieldTarget> = serde_json::from_str(&text)
        .with_context(|| format!("parsing field targets {}", fields.display()))?;
    info!(targets = targets.len(), threshold = config.match_threshold, "using local vector matcher");

    let embedder = Arc::new(HttpEmbedder::new(client(embed_url, timeout)?));
    Ok(Arc::new(VectorMatcher::new(embedder, targets, config.match_threshold)))
}

/// Dispatches `http(s)://` URIs to HTTP and everything else to the filesystem.
struct RoutingBlobs {
    fs: FsBlobSource,
    http: HttpBlobSource,
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

#[async_trait]
impl BlobSource for RoutingBlobs {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, CollaboratorError> {
        if is_remote(uri) {
            self.http.fetch(uri).await
        } else {
            self.fs.fetch(uri).await
        }
    }
}

pub fn blob_source(root: &Path) -> Arc<dyn BlobSource> {
    Arc::new(RoutingBlobs {
        fs: FsBlobSource::new(root),
        http: HttpBlobSource::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_uris() {
        assert!(is_remote("https://blobs.example/rules.json"));
        assert!(is_remote("http://localhost:9000/x"));
        assert!(!is_remote("file:///tmp/rules.json"));
        assert!(!is_remote("exports/rules.json"));
    }

    #[test]
    fn missing_service_urls_are_reported() {
        let err = form_service(None, Duration::from_secs(1)).err().unwrap();
        assert!(err.to_string().contains("ONBOARD_FORM_URL"));
        assert!(prefill_generator(None, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn local_blobs_resolve_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rules.json"), b"[]").unwrap();
        let blobs = blob_source(dir.path());
        assert_eq!(blobs.fetch("rules.json").await.unwrap(), b"[]");
    }

    #[cfg(not(feature = "duckdb"))]
    #[test]
    fn db_without_feature_is_rejected() {
        assert!(open_stores(Some(Path::new("onboard.db"))).is_err());
    }
}
