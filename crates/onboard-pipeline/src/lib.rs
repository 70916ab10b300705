//! Pipeline runtime: legacy rule reconciliation and BRD prefill orchestration.

pub mod config;
mod error;
pub mod parse;
pub mod prefill;
pub mod reconcile;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, PipelineConfig};
pub use error::PipelineError;
pub use parse::{ExportKind, ParseError, parse_export};
pub use prefill::{PrefillOrchestrator, PrefillRequest};
pub use reconcile::{ReconcileOutcome, ReconcileRequest, ReconcileService};
