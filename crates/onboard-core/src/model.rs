//! Shared record types for legacy rule reconciliation and BRD prefill.
//!
//! Field names follow the legacy export format (camelCase on the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One rule from a legacy system's rule export.
///
/// `owner_id`/`owner_name` tell the main legacy entity apart from a site
/// sub-entity; both share the same `rule_id` namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub rule_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub order: Option<String>,
    /// Textual label from the legacy export, when it carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

impl RuleRecord {
    pub fn new(rule_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            owner_id: None,
            owner_name: None,
            value: value.into(),
            order: None,
            rule_name: None,
        }
    }

    /// Attach the owning entity.
    pub fn owned_by(mut self, owner_id: impl Into<String>, owner_name: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self.owner_name = Some(owner_name.into());
        self
    }

    pub fn named(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    /// The name this rule is matched under in the guidance catalog.
    ///
    /// `rule_name` if non-empty, else `owner_name` if non-empty, else `rule_id`.
    pub fn label(&self) -> &str {
        non_empty(&self.rule_name)
            .or_else(|| non_empty(&self.owner_name))
            .unwrap_or(&self.rule_id)
    }

    /// Both owner fields present and non-empty.
    pub fn is_owned(&self) -> bool {
        non_empty(&self.owner_id).is_some() && non_empty(&self.owner_name).is_some()
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// A mapping from a legacy rule label to a structured BRD field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceEntry {
    pub source_name: String,
    #[serde(default)]
    pub mapping_key: Option<String>,
    #[serde(default)]
    pub similarity: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub question_id: Option<String>,
}

impl GuidanceEntry {
    /// An unresolved entry: only the source name is known.
    pub fn candidate(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            mapping_key: None,
            similarity: None,
            explanation: None,
            question_id: None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.mapping_key.is_some()
    }
}

/// One exported row: a rule joined with its guidance, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedRuleRow {
    #[serde(flatten)]
    pub rule: RuleRecord,
    pub guidance: Option<GuidanceEntry>,
}

impl CombinedRuleRow {
    pub fn mapping_key(&self) -> Option<&str> {
        self.guidance.as_ref().and_then(|g| g.mapping_key.as_deref())
    }
}

/// Identity of the main legacy entity or one of its sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEntityInfo {
    pub id: String,
    pub name: String,
}

impl LegacyEntityInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Legacy BRD attached to a new BRD: one main entity plus ordered sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    pub brd_id: String,
    pub main: LegacyEntityInfo,
    #[serde(default)]
    pub sites: Vec<LegacyEntityInfo>,
    /// Where the legacy rule export lives.
    #[serde(default)]
    pub rules_uri: Option<String>,
    /// Site ids that have been prefilled at least once.
    #[serde(default)]
    pub prefilled_sites: Vec<String>,
}

impl LegacyRecord {
    pub fn new(brd_id: impl Into<String>, main: LegacyEntityInfo) -> Self {
        Self {
            brd_id: brd_id.into(),
            main,
            sites: Vec::new(),
            rules_uri: None,
            prefilled_sites: Vec::new(),
        }
    }

    pub fn with_site(mut self, site: LegacyEntityInfo) -> Self {
        self.sites.push(site);
        self
    }

    /// Record a prefilled site. Returns `false` if it was already recorded.
    pub fn mark_site_prefilled(&mut self, site_id: &str) -> bool {
        if self.prefilled_sites.iter().any(|s| s == site_id) {
            return false;
        }
        self.prefilled_sites.push(site_id.to_string());
        true
    }
}

/// Per-site form snapshot, keyed by `(brd_id, site_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    /// Assigned by the store on first save.
    #[serde(default)]
    pub id: Option<String>,
    pub brd_id: String,
    pub site_id: String,
    pub site_name: String,
    #[serde(default)]
    pub form: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteRecord {
    pub fn new(brd_id: impl Into<String>, site: &LegacyEntityInfo) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            brd_id: brd_id.into(),
            site_id: site.id.clone(),
            site_name: site.name.clone(),
            form: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the whole form snapshot.
    pub fn replace_form(&mut self, form: Map<String, Value>) {
        self.form = form;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_record_wire_format() {
        let json = r#"{
            "ruleId": "1013",
            "ownerId": "BRD-1",
            "ownerName": "Main",
            "value": "v1",
            "order": null
        }"#;
        let rule: RuleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rule.rule_id, "1013");
        assert_eq!(rule.owner_name.as_deref(), Some("Main"));
        assert!(rule.order.is_none());
        assert!(rule.rule_name.is_none());

        let back = serde_json::to_value(&rule).unwrap();
        assert_eq!(back["ruleId"], "1013");
        assert!(back.get("ruleName").is_none());
    }

    #[test]
    fn rule_record_missing_owner_fields() {
        let rule: RuleRecord = serde_json::from_str(r#"{"ruleId": "7", "value": "x"}"#).unwrap();
        assert!(rule.owner_id.is_none());
        assert!(!rule.is_owned());
    }

    #[test]
    fn label_prefers_rule_name_then_owner_then_id() {
        let bare = RuleRecord::new("42", "v");
        assert_eq!(bare.label(), "42");

        let owned = RuleRecord::new("42", "v").owned_by("S-1", "Site One");
        assert_eq!(owned.label(), "Site One");

        let named = RuleRecord::new("42", "v")
            .owned_by("S-1", "Site One")
            .named("Payment Terms");
        assert_eq!(named.label(), "Payment Terms");

        let empty_name = RuleRecord::new("42", "v").named("");
        assert_eq!(empty_name.label(), "42");
    }

    #[test]
    fn is_owned_requires_both_fields() {
        let mut rule = RuleRecord::new("1", "v").owned_by("S-1", "");
        assert!(!rule.is_owned());
        rule.owner_name = Some("Site".into());
        assert!(rule.is_owned());
        rule.owner_id = None;
        assert!(!rule.is_owned());
    }

    #[test]
    fn combined_row_flattens_rule() {
        let row = CombinedRuleRow {
            rule: RuleRecord::new("1013", "v1").owned_by("BRD-1", "Main"),
            guidance: None,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["ruleId"], "1013");
        assert_eq!(value["ownerName"], "Main");
        assert!(value["guidance"].is_null());
    }

    #[test]
    fn mark_site_prefilled_is_idempotent() {
        let mut record = LegacyRecord::new("BRD-1", LegacyEntityInfo::new("L-1", "Main"));
        assert!(record.mark_site_prefilled("S-1"));
        assert!(!record.mark_site_prefilled("S-1"));
        assert_eq!(record.prefilled_sites, vec!["S-1"]);
    }

    #[test]
    fn site_record_replace_form_bumps_updated_at() {
        let mut site = SiteRecord::new("BRD-1", &LegacyEntityInfo::new("S-1", "North"));
        let before = site.updated_at;
        let mut form = Map::new();
        form.insert("general".into(), Value::String("x".into()));
        site.replace_form(form);
        assert_eq!(site.form.len(), 1);
        assert!(site.updated_at >= before);
    }
}
