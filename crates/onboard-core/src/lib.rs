//! Core types, rule classification, JSON section cleaning, and collaborator ports.

pub mod combine;
pub mod eligibility;
pub mod form;
pub mod merge;
pub mod model;
pub mod ports;

pub use combine::{CombineError, build_artifact, combine_rules};
pub use eligibility::{SUMMARY_RULE_ID, is_eligible};
pub use form::{FormResponse, FormUpdate, SectionOp, base_tree, process_brd_response};
pub use merge::{MergeError, clean, convert_json_to_map};
pub use model::{
    CombinedRuleRow, GuidanceEntry, LegacyEntityInfo, LegacyRecord, RuleRecord, SiteRecord,
};
pub use ports::{
    BlobSource, BoxError, CollaboratorError, FormService, PrefillGenerator, SemanticMatcher,
    TextEmbedder,
};
