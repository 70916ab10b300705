//! Eligibility of a legacy rule for the combined rules export.
//!
//! A rule is exported when any one of these holds:
//!
//! - it is the summary rule (`ruleId == "1013"`), which is always included
//! - it is attributable: both `ownerId` and `ownerName` are non-empty
//! - the guidance catalog resolved it to a mapping key

use crate::model::{GuidanceEntry, RuleRecord};

/// Rule id of the always-included summary rule.
pub const SUMMARY_RULE_ID: &str = "1013";

/// Decide whether `rule` gets a row in the combined export.
pub fn is_eligible(rule: &RuleRecord, guidance: Option<&GuidanceEntry>) -> bool {
    rule.rule_id == SUMMARY_RULE_ID
        || rule.is_owned()
        || guidance.is_some_and(GuidanceEntry::is_mapped)
}
