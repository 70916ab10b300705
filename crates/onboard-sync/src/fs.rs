//! Filesystem blob source for locally exported rule files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use onboard_core::{BlobSource, CollaboratorError};
use tracing::debug;

/// Reads blobs from disk, resolving relative URIs against `root`.
///
/// Accepts plain paths and `file://` URIs.
pub struct FsBlobSource {
    root: PathBuf,
}

impl FsBlobSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl BlobSource for FsBlobSource {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, CollaboratorError> {
        let path = self.resolve(uri);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CollaboratorError::new("blob source", e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "read blob");
        Ok(bytes)
    }
}
