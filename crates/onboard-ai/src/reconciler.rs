//! Reconciliation of freshly uploaded legacy rules against the guidance catalog.
//!
//! Rules whose label already has a mapping are left alone. Every other distinct
//! label becomes a candidate, and all candidates go to the semantic matcher in
//! a single batched call. Matched and unmatched candidates are merged back so
//! unmatched labels are retried on the next reconciliation.

use std::collections::HashSet;

use onboard_core::{CollaboratorError, GuidanceEntry, RuleRecord, SemanticMatcher};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("semantic matching failed: {0}")]
    Matcher(#[from] CollaboratorError),

    #[error("semantic matcher returned {got} entries for {expected} candidates")]
    MatcherContract { expected: usize, got: usize },
}

/// One candidate per distinct, non-empty rule label without an existing mapping.
///
/// Candidates keep the order in which their labels first appear in `rules`.
pub fn candidates_for(existing: &[GuidanceEntry], rules: &[RuleRecord]) -> Vec<GuidanceEntry> {
    let mapped: HashSet<&str> = existing
        .iter()
        .filter(|g| g.is_mapped())
        .map(|g| g.source_name.as_str())
        .collect();

    let mut seen = HashSet::new();
    rules
        .iter()
        .map(RuleRecord::label)
        .filter(|label| !label.is_empty() && !mapped.contains(label) && seen.insert(*label))
        .map(GuidanceEntry::candidate)
        .collect()
}

/// Fold matcher results into the existing catalog.
///
/// An unmapped existing entry with the same source name is replaced in place;
/// anything else is appended in result order.
pub fn merge_resolved(
    mut existing: Vec<GuidanceEntry>,
    resolved: Vec<GuidanceEntry>,
) -> Vec<GuidanceEntry> {
    for entry in resolved {
        let slot = existing
            .iter_mut()
            .find(|g| !g.is_mapped() && g.source_name == entry.source_name);
        match slot {
            Some(slot) => *slot = entry,
            None => existing.push(entry),
        }
    }
    existing
}

/// Reconcile `new_rules` into `existing`, returning the full updated catalog.
///
/// With no new rules (or nothing left to match) the catalog comes back
/// unchanged and the matcher is never called. Matcher failures are fatal.
pub async fn reconcile(
    matcher: &dyn SemanticMatcher,
    existing: Vec<GuidanceEntry>,
    new_rules: &[RuleRecord],
) -> Result<Vec<GuidanceEntry>, ReconcileError> {
    if new_rules.is_empty() {
        debug!("no new rules; guidance catalog unchanged");
        return Ok(existing);
    }

    let candidates = candidates_for(&existing, new_rules);
    if candidates.is_empty() {
        info!(rules = new_rules.len(), "all rule labels already mapped");
        return Ok(existing);
    }

    let expected = candidates.len();
    info!(rules = new_rules.len(), candidates = expected, "requesting semantic matches");
    let resolved = matcher.find_matches(candidates).await?;
    if resolved.len() != expected {
        return Err(ReconcileError::MatcherContract {
            expected,
            got: resolved.len(),
        });
    }

    let matched = resolved.iter().filter(|g| g.is_mapped()).count();
    info!(matched, unmatched = expected - matched, "semantic matching complete");
    Ok(merge_resolved(existing, resolved))
}
