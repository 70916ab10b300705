//! BRD prefill orchestration.
//!
//! One run fetches the BRD form, derives a base tree, and asks the generator
//! to fill it from the named documents. The main form is updated in place.
//! When a legacy record exists, every site gets its own scoped generation
//! stored as a separate snapshot.
//!
//! The run only fails outright when the form cannot be fetched. Every later
//! problem (generation failure, an unusable reply, a rejected update, a
//! failed save) is logged and turns the overall result into `false` without
//! stopping the remaining sites.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use onboard_core::merge::clean_object;
use onboard_core::{
    CollaboratorError, FormService, FormUpdate, LegacyEntityInfo, LegacyRecord, PrefillGenerator,
    SiteRecord, base_tree, convert_json_to_map, process_brd_response,
};
use onboard_store::{LegacyStore, SiteStore};
use serde_json::{Map, Value};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct PrefillRequest {
    pub brd_id: String,
    pub document_names: Vec<String>,
}

impl PrefillRequest {
    pub fn new(brd_id: impl Into<String>, document_names: Vec<String>) -> Self {
        Self {
            brd_id: brd_id.into(),
            document_names,
        }
    }
}

/// Result of one site's prefill.
#[derive(Debug)]
struct SiteOutcome {
    site_id: String,
    ok: bool,
}

pub struct PrefillOrchestrator {
    forms: Arc<dyn FormService>,
    generator: Arc<dyn PrefillGenerator>,
    sites: Arc<dyn SiteStore>,
    legacy: Arc<dyn LegacyStore>,
    site_concurrency: usize,
}

impl PrefillOrchestrator {
    pub fn new(
        forms: Arc<dyn FormService>,
        generator: Arc<dyn PrefillGenerator>,
        sites: Arc<dyn SiteStore>,
        legacy: Arc<dyn LegacyStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            forms,
            generator,
            sites,
            legacy,
            site_concurrency: config.site_concurrency.max(1),
        }
    }

    /// Prefill the BRD's main form and all of its legacy sites.
    ///
    /// Returns `Ok(true)` only when every part succeeded. `Err` is reserved
    /// for a form fetch transport failure or an unreadable legacy record.
    pub async fn prefill(&self, req: &PrefillRequest) -> Result<bool, PipelineError> {
        let span = info_span!("prefill", brd_id = %req.brd_id);
        self.run(req).instrument(span).await
    }

    async fn run(&self, req: &PrefillRequest) -> Result<bool, PipelineError> {
        let Some(base) = self.fetch_base(&req.brd_id).await? else {
            return Ok(false);
        };
        let legacy = self.legacy.find_by_brd_id(&req.brd_id).await?;
        debug!(
            legacy = legacy.is_some(),
            sites = legacy.as_ref().map_or(0, |r| r.sites.len()),
            documents = req.document_names.len(),
            "starting prefill"
        );

        let main_ok = self.prefill_main(req, &base, legacy.as_ref()).await;

        let sites = match legacy {
            Some(record) if !record.sites.is_empty() => {
                let outcomes = self.prefill_sites(req, &base, &record.sites).await;
                self.record_prefilled(record, outcomes).await
            }
            _ => Vec::new(),
        };

        let failed: Vec<&str> = sites
            .iter()
            .filter(|s| !s.ok)
            .map(|s| s.site_id.as_str())
            .collect();
        let ok = main_ok && failed.is_empty();
        info!(
            main = main_ok,
            sites = sites.len(),
            failed_sites = ?failed,
            ok,
            "prefill finished"
        );
        Ok(ok)
    }

    /// The form's base tree, or `None` when there is nothing to prefill.
    async fn fetch_base(&self, brd_id: &str) -> Result<Option<Value>, PipelineError> {
        let Some(data) = self
            .forms
            .get_form(brd_id)
            .await?
            .and_then(|r| r.data)
            .filter(|d| !d.is_null())
        else {
            warn!("BRD form not found or has no data");
            return Ok(None);
        };
        let base = base_tree(&data);
        if base.is_none() {
            warn!("BRD form data is not an object");
        }
        Ok(base)
    }

    async fn prefill_main(
        &self,
        req: &PrefillRequest,
        base: &Value,
        legacy: Option<&LegacyRecord>,
    ) -> bool {
        let reply = match legacy {
            Some(record) => {
                self.generator
                    .generate_scoped(base, &req.document_names, &record.main.name, &record.main.id)
                    .await
            }
            None => self.generator.generate(base, &req.document_names).await,
        };
        let Some(sections) = prepare(reply, "main") else {
            return false;
        };

        let update = FormUpdate::from_sections(sections);
        if update.is_empty() {
            info!("generated main form is empty; nothing to update");
            return true;
        }
        match self.forms.update_partial(&req.brd_id, &update).await {
            Ok(response) => {
                let ok = process_brd_response(response.as_ref());
                debug!(sections = update.len(), ok, "main form updated");
                ok
            }
            Err(e) => {
                warn!(error = %e, "main form update failed");
                false
            }
        }
    }

    /// Prefill every site, at most `site_concurrency` at a time, in site order.
    async fn prefill_sites(
        &self,
        req: &PrefillRequest,
        main_base: &Value,
        sites: &[LegacyEntityInfo],
    ) -> Vec<SiteOutcome> {
        stream::iter(sites)
            .map(|site| async move {
                let ok = self
                    .prefill_site(req, main_base, site)
                    .instrument(info_span!("site", site_id = %site.id))
                    .await;
                SiteOutcome {
                    site_id: site.id.clone(),
                    ok,
                }
            })
            .buffered(self.site_concurrency)
            .collect()
            .await
    }

    async fn prefill_site(&self, req: &PrefillRequest, main_base: &Value, site: &LegacyEntityInfo) -> bool {
        let existing = match self.sites.find_by_brd_id_and_site_id(&req.brd_id, &site.id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "site lookup failed");
                return false;
            }
        };
        let mut record = existing.unwrap_or_else(|| SiteRecord::new(&req.brd_id, site));

        // A site with a saved snapshot starts from it, otherwise from the main form.
        let owned_base;
        let base = if record.form.is_empty() {
            main_base
        } else {
            owned_base = Value::Object(record.form.clone());
            &owned_base
        };

        let reply = self
            .generator
            .generate_scoped(base, &req.document_names, &site.name, &site.id)
            .await;
        let Some(form) = prepare(reply, &site.id) else {
            return false;
        };

        record.site_name = site.name.clone();
        record.replace_form(form);
        match self.sites.save(record).await {
            Ok(saved) => {
                debug!(id = saved.id.as_deref().unwrap_or("-"), "site snapshot saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "site snapshot save failed");
                false
            }
        }
    }

    /// Record successful sites on the legacy record, one save per newly
    /// prefilled site. A failed save marks only that site as failed.
    async fn record_prefilled(
        &self,
        mut record: LegacyRecord,
        outcomes: Vec<SiteOutcome>,
    ) -> Vec<SiteOutcome> {
        let mut recorded = Vec::with_capacity(outcomes.len());
        for mut outcome in outcomes {
            if outcome.ok && record.mark_site_prefilled(&outcome.site_id) {
                match self.legacy.save(record.clone()).await {
                    Ok(saved) => record = saved,
                    Err(e) => {
                        warn!(site_id = %outcome.site_id, error = %e, "failed to record prefilled site");
                        record.prefilled_sites.retain(|s| s != &outcome.site_id);
                        outcome.ok = false;
                    }
                }
            }
            recorded.push(outcome);
        }
        recorded
    }
}

/// Turn a generator reply into cleaned form sections, or `None` on any failure.
fn prepare(reply: Result<Option<Value>, CollaboratorError>, scope: &str) -> Option<Map<String, Value>> {
    match reply {
        Err(e) => {
            warn!(scope, error = %e, "prefill generation failed");
            None
        }
        Ok(None) => {
            warn!(scope, "prefill generator returned no data");
            None
        }
        Ok(Some(generated)) => match convert_json_to_map(generated) {
            Ok(sections) => Some(clean_object(&sections)),
            Err(e) => {
                warn!(scope, error = %e, "cannot process generated form");
                None
            }
        },
    }
}
