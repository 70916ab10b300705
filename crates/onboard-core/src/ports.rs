//! Contracts for the external collaborators the pipeline talks to.
//!
//! Adapters live in `onboard-sync` (HTTP, filesystem) and `onboard-ai`
//! (local vector matching). Every collaborator failure is reported as a
//! [`CollaboratorError`] naming the collaborator and carrying the cause.
//! The cause is part of the message and is not repeated as an error source.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::form::{FormResponse, FormUpdate};
use crate::model::GuidanceEntry;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[error("{collaborator}: {cause}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub cause: BoxError,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, cause: impl Into<BoxError>) -> Self {
        Self {
            collaborator,
            cause: cause.into(),
        }
    }

    /// Wrap a plain message, e.g. a broken response contract.
    pub fn msg(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::new(collaborator, message.into())
    }
}

/// Raw bytes from a path or URL.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Batched semantic matching of guidance candidates.
///
/// Returns a list of the same length and order as `candidates`, with
/// `mapping_key`, `similarity`, `explanation` and `question_id` filled in
/// where a match was found.
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    async fn find_matches(
        &self,
        candidates: Vec<GuidanceEntry>,
    ) -> Result<Vec<GuidanceEntry>, CollaboratorError>;
}

/// Text embedding service: one vector per input, same order.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError>;
}

/// The BRD form service.
#[async_trait]
pub trait FormService: Send + Sync {
    /// `None` when no BRD matches `brd_id`.
    async fn get_form(&self, brd_id: &str) -> Result<Option<FormResponse>, CollaboratorError>;

    /// Apply `update` in order. `None` when the service sent no body.
    async fn update_partial(
        &self,
        brd_id: &str,
        update: &FormUpdate,
    ) -> Result<Option<FormResponse>, CollaboratorError>;
}

/// Prefill generation from a base tree plus supporting documents.
#[async_trait]
pub trait PrefillGenerator: Send + Sync {
    /// Prefill without legacy context.
    async fn generate(
        &self,
        base: &Value,
        document_names: &[String],
    ) -> Result<Option<Value>, CollaboratorError>;

    /// Prefill scoped to a legacy entity or site: `context_name` is its
    /// display name, `label` its legacy id.
    async fn generate_scoped(
        &self,
        base: &Value,
        document_names: &[String],
        context_name: &str,
        label: &str,
    ) -> Result<Option<Value>, CollaboratorError>;
}
