//! Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables shared by reconciliation and prefill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Sites prefilled at once. `1` keeps the fan-out strictly sequential.
    pub site_concurrency: usize,
    /// Key of the guidance catalog document.
    pub catalog_key: String,
    /// Minimum cosine similarity accepted by the local vector matcher.
    pub match_threshold: f32,
    /// Standard-data baseline used when no catalog has been saved yet.
    pub standard_data_uri: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            site_concurrency: 1,
            catalog_key: "guidance".to_string(),
            match_threshold: 0.5,
            standard_data_uri: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields fall back to defaults.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential() {
        let config = PipelineConfig::default();
        assert_eq!(config.site_concurrency, 1);
        assert_eq!(config.catalog_key, "guidance");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onboard.json");
        std::fs::write(&path, r#"{"siteConcurrency": 4}"#).unwrap();

        let config = PipelineConfig::from_json(&path).unwrap();
        assert_eq!(config.site_concurrency, 4);
        assert_eq!(config.catalog_key, "guidance");
        assert!(config.standard_data_uri.is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_json(Path::new("/nonexistent/onboard.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
