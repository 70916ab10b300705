//! AI layer: semantic reconciliation of legacy rules, local vector matching.

mod reconciler;
mod vector;

pub use reconciler::{ReconcileError, candidates_for, merge_resolved, reconcile};
pub use vector::{FieldTarget, VectorMatcher};
