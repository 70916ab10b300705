//! Legacy rule reconciliation: upload → guidance catalog → combined artifact.

use std::sync::Arc;

use onboard_core::{BlobSource, GuidanceEntry, RuleRecord, SemanticMatcher, build_artifact};
use onboard_store::{CatalogStore, LegacyStore};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::parse::{ExportKind, parse_export};

/// Where to read a rule upload from, and which catalog to reconcile it into.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub rules_uri: String,
    /// Catalog key; the configured default when `None`.
    pub catalog_key: Option<String>,
    /// Standard-data baseline; the configured one when `None`.
    pub standard_uri: Option<String>,
}

impl ReconcileRequest {
    pub fn new(rules_uri: impl Into<String>) -> Self {
        Self {
            rules_uri: rules_uri.into(),
            catalog_key: None,
            standard_uri: None,
        }
    }
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Pretty-printed JSON array of combined rows.
    pub artifact: Vec<u8>,
    /// The catalog as persisted after this run.
    pub catalog: Vec<GuidanceEntry>,
    pub rules: usize,
}

/// Runs reconciliation against the configured collaborators.
pub struct ReconcileService {
    blobs: Arc<dyn BlobSource>,
    matcher: Arc<dyn SemanticMatcher>,
    catalogs: Arc<dyn CatalogStore>,
    legacy: Arc<dyn LegacyStore>,
    config: PipelineConfig,
}

impl ReconcileService {
    pub fn new(
        blobs: Arc<dyn BlobSource>,
        matcher: Arc<dyn SemanticMatcher>,
        catalogs: Arc<dyn CatalogStore>,
        legacy: Arc<dyn LegacyStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            blobs,
            matcher,
            catalogs,
            legacy,
            config,
        }
    }

    /// Fetch and parse a rule upload, then reconcile it.
    pub async fn reconcile(&self, req: &ReconcileRequest) -> Result<ReconcileOutcome, PipelineError> {
        let bytes = self.blobs.fetch(&req.rules_uri).await?;
        let rules: Vec<RuleRecord> = parse_export(&bytes, ExportKind::UserRules)?;
        info!(uri = %req.rules_uri, rules = rules.len(), "parsed rule export");
        self.reconcile_rules(req, &rules).await
    }

    /// Reconcile already-parsed rules and persist the updated catalog.
    ///
    /// The catalog is only written once matching has fully succeeded.
    pub async fn reconcile_rules(
        &self,
        req: &ReconcileRequest,
        rules: &[RuleRecord],
    ) -> Result<ReconcileOutcome, PipelineError> {
        if rules.is_empty() {
            return Err(PipelineError::Validation(format!(
                "rule export {} contains no rules",
                req.rules_uri
            )));
        }
        let key = req.catalog_key.as_deref().unwrap_or(&self.config.catalog_key);
        let existing = self.load_catalog(key, req.standard_uri.as_deref()).await?;
        let before = existing.len();

        let catalog = onboard_ai::reconcile(self.matcher.as_ref(), existing, rules).await?;
        self.catalogs.save(key, &catalog).await?;
        info!(
            catalog = key,
            before,
            after = catalog.len(),
            mapped = catalog.iter().filter(|g| g.is_mapped()).count(),
            "guidance catalog saved"
        );

        let artifact = build_artifact(rules, &catalog)?;
        Ok(ReconcileOutcome {
            artifact,
            catalog,
            rules: rules.len(),
        })
    }

    /// Re-run reconciliation for a BRD's stored legacy rule upload.
    pub async fn convert_legacy(&self, brd_id: &str) -> Result<ReconcileOutcome, PipelineError> {
        let record = self
            .legacy
            .find_by_brd_id(brd_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound {
                brd_id: brd_id.to_string(),
            })?;
        let Some(rules_uri) = record.rules_uri else {
            return Err(PipelineError::Validation(format!(
                "legacy record for BRD {brd_id} has no uploaded rule export"
            )));
        };
        self.reconcile(&ReconcileRequest::new(rules_uri)).await
    }

    /// Stored catalog, else the standard-data baseline, else empty.
    async fn load_catalog(
        &self,
        key: &str,
        standard_uri: Option<&str>,
    ) -> Result<Vec<GuidanceEntry>, PipelineError> {
        if let Some(entries) = self.catalogs.load(key).await? {
            return Ok(entries);
        }
        let Some(uri) = standard_uri.or(self.config.standard_data_uri.as_deref()) else {
            warn!(catalog = key, "no stored catalog and no standard data; starting empty");
            return Ok(Vec::new());
        };
        let bytes = self.blobs.fetch(uri).await?;
        let entries: Vec<GuidanceEntry> = parse_export(&bytes, ExportKind::StandardData)?;
        info!(uri, entries = entries.len(), "seeded catalog from standard data");
        Ok(entries)
    }
}
