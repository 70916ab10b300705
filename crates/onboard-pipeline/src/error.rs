use onboard_ai::ReconcileError;
use onboard_core::{CollaboratorError, CombineError};
use onboard_store::StoreError;
use thiserror::Error;

use crate::parse::ParseError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no legacy record for BRD {brd_id}")]
    NotFound { brd_id: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CombineError> for PipelineError {
    fn from(err: CombineError) -> Self {
        match err {
            CombineError::EmptyRules => Self::Validation(err.to_string()),
            CombineError::Serialization(e) => Self::Serialization(e.to_string()),
        }
    }
}

impl From<ReconcileError> for PipelineError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Matcher(e) => Self::Collaborator(e),
            contract @ ReconcileError::MatcherContract { .. } => Self::Collaborator(
                CollaboratorError::msg("semantic matcher", contract.to_string()),
            ),
        }
    }
}

impl From<ParseError> for PipelineError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Empty(_) => Self::Validation(err.to_string()),
            other => Self::Serialization(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ExportKind;

    #[test]
    fn empty_rules_are_validation_errors() {
        assert!(matches!(
            PipelineError::from(CombineError::EmptyRules),
            PipelineError::Validation(_)
        ));
        assert!(matches!(
            PipelineError::from(ParseError::Empty(ExportKind::UserRules)),
            PipelineError::Validation(_)
        ));
    }

    #[test]
    fn matcher_contract_is_collaborator_failure() {
        let err = PipelineError::from(ReconcileError::MatcherContract {
            expected: 2,
            got: 1,
        });
        match err {
            PipelineError::Collaborator(e) => {
                assert_eq!(e.collaborator, "semantic matcher");
                assert!(e.to_string().contains("1 entries for 2 candidates"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn collaborator_cause_is_not_chained_twice() {
        use std::error::Error;

        let err = PipelineError::from(CollaboratorError::msg("form service", "timeout"));
        assert_eq!(err.to_string(), "form service: timeout");
        assert!(err.source().is_none());
    }
}
