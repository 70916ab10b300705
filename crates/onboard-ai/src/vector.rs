//! Local semantic matcher: nearest BRD field by cosine similarity.
//!
//! Embeds every field target once (lazily, on first use), embeds each batch
//! of candidate labels in one call, and assigns each candidate its nearest
//! target when the similarity clears the threshold.

use std::sync::Arc;

use async_trait::async_trait;
use onboard_core::{CollaboratorError, GuidanceEntry, SemanticMatcher, TextEmbedder};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

const COLLABORATOR: &str = "vector matcher";

/// A structured BRD field a legacy label can map to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTarget {
    pub key: String,
    #[serde(default)]
    pub question_id: Option<String>,
    /// Human description, embedded instead of the key when present.
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldTarget {
    fn text(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.key)
    }
}

/// [`SemanticMatcher`] over a fixed field vocabulary and a [`TextEmbedder`].
pub struct VectorMatcher {
    embedder: Arc<dyn TextEmbedder>,
    targets: Vec<FieldTarget>,
    threshold: f32,
    target_vectors: OnceCell<Vec<Vec<f32>>>,
}

impl VectorMatcher {
    pub fn new(embedder: Arc<dyn TextEmbedder>, targets: Vec<FieldTarget>, threshold: f32) -> Self {
        Self {
            embedder,
            targets,
            threshold,
            target_vectors: OnceCell::new(),
        }
    }

    async fn target_vectors(&self) -> Result<&[Vec<f32>], CollaboratorError> {
        let vectors = self
            .target_vectors
            .get_or_try_init(|| async {
                let texts: Vec<String> = self.targets.iter().map(|t| t.text().to_string()).collect();
                let vectors = embed_normalized(self.embedder.as_ref(), &texts).await?;
                info!(targets = vectors.len(), "embedded field vocabulary");
                Ok::<_, CollaboratorError>(vectors)
            })
            .await?;
        Ok(vectors)
    }
}

#[async_trait]
impl SemanticMatcher for VectorMatcher {
    async fn find_matches(
        &self,
        candidates: Vec<GuidanceEntry>,
    ) -> Result<Vec<GuidanceEntry>, CollaboratorError> {
        if candidates.is_empty() || self.targets.is_empty() {
            return Ok(candidates);
        }
        let targets = self.target_vectors().await?;

        let names: Vec<String> = candidates.iter().map(|c| c.source_name.clone()).collect();
        let vectors = embed_normalized(self.embedder.as_ref(), &names).await?;
        if let (Some(target), Some(candidate)) = (targets.first(), vectors.first())
            && target.len() != candidate.len()
        {
            return Err(CollaboratorError::msg(
                COLLABORATOR,
                format!(
                    "candidate vectors have {} dimensions, field vectors have {}",
                    candidate.len(),
                    target.len()
                ),
            ));
        }

        Ok(candidates
            .into_iter()
            .zip(vectors)
            .map(|(mut candidate, vector)| {
                if let Some((idx, sim)) = best_match(targets, &vector)
                    && sim >= self.threshold
                {
                    let target = &self.targets[idx];
                    candidate.mapping_key = Some(target.key.clone());
                    candidate.question_id = target.question_id.clone();
                    candidate.similarity = Some(format!("{sim:.4}"));
                    candidate.explanation = Some(format!("nearest field: {}", target.text()));
                } else {
                    debug!(source = %candidate.source_name, "no field above threshold");
                }
                candidate
            })
            .collect())
    }
}

/// Embed `texts` and L2-normalize each vector.
///
/// One vector per text is required, all of the same dimension.
async fn embed_normalized(
    embedder: &dyn TextEmbedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, CollaboratorError> {
    let mut vectors = embedder.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(CollaboratorError::msg(
            COLLABORATOR,
            format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len()),
        ));
    }
    if let Some(first) = vectors.first()
        && let Some(odd) = vectors.iter().find(|v| v.len() != first.len())
    {
        return Err(CollaboratorError::msg(
            COLLABORATOR,
            format!(
                "embedder returned mixed dimensions: {} and {}",
                first.len(),
                odd.len()
            ),
        ));
    }
    for v in &mut vectors {
        normalize(v);
    }
    Ok(vectors)
}

/// Index and similarity of the closest target.
fn best_match(targets: &[Vec<f32>], embedding: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, target) in targets.iter().enumerate() {
        let sim = cosine_sim(embedding, target);
        if best.is_none_or(|(_, b)| sim > b) {
            best = Some((idx, sim));
        }
    }
    best
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2-normalize a vector in place.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
