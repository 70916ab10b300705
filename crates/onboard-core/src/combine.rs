//! Combined "rules + mapping" export.
//!
//! Joins each legacy rule with its guidance entry (by label), keeps the rows
//! the eligibility predicate accepts, and serializes them as pretty JSON.

use thiserror::Error;
use tracing::debug;

use crate::eligibility::is_eligible;
use crate::model::{CombinedRuleRow, GuidanceEntry, RuleRecord};

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("no rules to combine: the rule export is empty or was not uploaded")]
    EmptyRules,

    #[error("failed to serialize combined rules: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// First guidance entry whose source name equals the rule's label.
pub fn find_guidance<'a>(
    rule: &RuleRecord,
    guidance: &'a [GuidanceEntry],
) -> Option<&'a GuidanceEntry> {
    let label = rule.label();
    guidance.iter().find(|g| g.source_name == label)
}

/// Project the eligible rules into combined rows, preserving rule order.
pub fn combine_rules(rules: &[RuleRecord], guidance: &[GuidanceEntry]) -> Vec<CombinedRuleRow> {
    rules
        .iter()
        .filter_map(|rule| {
            let matched = find_guidance(rule, guidance);
            if is_eligible(rule, matched) {
                Some(CombinedRuleRow {
                    rule: rule.clone(),
                    guidance: matched.cloned(),
                })
            } else {
                debug!(
                    rule_id = %rule.rule_id,
                    label = rule.label(),
                    "rule not eligible for export"
                );
                None
            }
        })
        .collect()
}

/// Build the downloadable artifact: a pretty-printed UTF-8 JSON array of rows.
///
/// An empty rule list is rejected; no empty artifacts are produced.
pub fn build_artifact(
    rules: &[RuleRecord],
    guidance: &[GuidanceEntry],
) -> Result<Vec<u8>, CombineError> {
    if rules.is_empty() {
        return Err(CombineError::EmptyRules);
    }
    let rows = combine_rules(rules, guidance);
    debug!(rules = rules.len(), rows = rows.len(), "combined rules");
    Ok(serde_json::to_vec_pretty(&rows)?)
}
