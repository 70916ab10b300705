//! HTTP adapters for the BRD form, prefill generation, semantic matching,
//! embedding, and blob services.

use std::time::Duration;

use async_trait::async_trait;
use onboard_core::{
    BlobSource, CollaboratorError, FormResponse, FormService, FormUpdate, GuidanceEntry,
    PrefillGenerator, SemanticMatcher, TextEmbedder,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shared HTTP client bound to one service's base URL.
#[derive(Clone)]
pub struct SyncClient {
    client: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    /// Create a client for the given base URL.
    ///
    /// `base_url` should be like `http://localhost:8080` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Same as [`new`](Self::new), with a per-request timeout.
    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Fail on non-2xx, keeping the body for the error message.
async fn check(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Parse an optional JSON body: empty bodies and `204` are `None`.
async fn optional_json<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, SyncError> {
    if resp.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let bytes = resp.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn collaborator(name: &'static str) -> impl Fn(SyncError) -> CollaboratorError {
    move |e| CollaboratorError::new(name, e)
}

// ── BRD form service ──

/// `GET`/`PATCH {base}/api/brd/{id}/form`.
///
/// A `404` on `GET` means no such BRD and yields `None`. On `PATCH` it is a
/// server error like any other non-2xx status.
pub struct HttpFormService {
    http: SyncClient,
}

impl HttpFormService {
    pub fn new(http: SyncClient) -> Self {
        Self { http }
    }

    fn form_url(&self, brd_id: &str) -> String {
        self.http.url(&format!("/api/brd/{brd_id}/form"))
    }

    async fn fetch(&self, brd_id: &str) -> Result<Option<FormResponse>, SyncError> {
        let url = self.form_url(brd_id);
        info!(url = %url, "fetching BRD form");
        let resp = self.http.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        optional_json(check(resp).await?).await
    }

    async fn patch(
        &self,
        brd_id: &str,
        update: &FormUpdate,
    ) -> Result<Option<FormResponse>, SyncError> {
        let url = self.form_url(brd_id);
        info!(url = %url, ops = update.len(), "updating BRD form");
        let resp = self.http.client.patch(&url).json(update).send().await?;
        optional_json(check(resp).await?).await
    }
}

#[async_trait]
impl FormService for HttpFormService {
    async fn get_form(&self, brd_id: &str) -> Result<Option<FormResponse>, CollaboratorError> {
        self.fetch(brd_id).await.map_err(collaborator("form service"))
    }

    async fn update_partial(
        &self,
        brd_id: &str,
        update: &FormUpdate,
    ) -> Result<Option<FormResponse>, CollaboratorError> {
        self.patch(brd_id, update)
            .await
            .map_err(collaborator("form service"))
    }
}

// ── Prefill generation ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrefillBody<'a> {
    base: &'a Value,
    document_names: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    context_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
}

/// `POST {base}/api/prefill`; a `null` or empty reply means nothing was generated.
pub struct HttpPrefillGenerator {
    http: SyncClient,
}

impl HttpPrefillGenerator {
    pub fn new(http: SyncClient) -> Self {
        Self { http }
    }

    async fn post(&self, body: &PrefillBody<'_>) -> Result<Option<Value>, SyncError> {
        let url = self.http.url("/api/prefill");
        info!(
            url = %url,
            documents = body.document_names.len(),
            context = body.context_name.unwrap_or("-"),
            "requesting prefill"
        );
        let resp = check(self.http.client.post(&url).json(body).send().await?).await?;
        let reply: Option<Value> = optional_json(resp).await?;
        Ok(reply.filter(|v| !v.is_null()))
    }
}

#[async_trait]
impl PrefillGenerator for HttpPrefillGenerator {
    async fn generate(
        &self,
        base: &Value,
        document_names: &[String],
    ) -> Result<Option<Value>, CollaboratorError> {
        let body = PrefillBody {
            base,
            document_names,
            context_name: None,
            label: None,
        };
        self.post(&body).await.map_err(collaborator("prefill generator"))
    }

    async fn generate_scoped(
        &self,
        base: &Value,
        document_names: &[String],
        context_name: &str,
        label: &str,
    ) -> Result<Option<Value>, CollaboratorError> {
        let body = PrefillBody {
            base,
            document_names,
            context_name: Some(context_name),
            label: Some(label),
        };
        self.post(&body).await.map_err(collaborator("prefill generator"))
    }
}

// ── Semantic matching ──

/// `POST {base}/api/guidance/match` with the whole candidate batch.
pub struct HttpMatcher {
    http: SyncClient,
}

impl HttpMatcher {
    pub fn new(http: SyncClient) -> Self {
        Self { http }
    }

    async fn post(&self, candidates: &[GuidanceEntry]) -> Result<Vec<GuidanceEntry>, SyncError> {
        let url = self.http.url("/api/guidance/match");
        info!(url = %url, count = candidates.len(), "requesting guidance matches");
        let resp = check(self.http.client.post(&url).json(candidates).send().await?).await?;
        let matched: Vec<GuidanceEntry> = resp.json().await?;
        info!(count = matched.len(), "received guidance matches");
        Ok(matched)
    }
}

#[async_trait]
impl SemanticMatcher for HttpMatcher {
    async fn find_matches(
        &self,
        candidates: Vec<GuidanceEntry>,
    ) -> Result<Vec<GuidanceEntry>, CollaboratorError> {
        self.post(&candidates)
            .await
            .map_err(collaborator("semantic matcher"))
    }
}

// ── Embeddings ──

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

/// `POST {base}/api/embed`.
pub struct HttpEmbedder {
    http: SyncClient,
}

impl HttpEmbedder {
    pub fn new(http: SyncClient) -> Self {
        Self { http }
    }

    async fn post(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SyncError> {
        let url = self.http.url("/api/embed");
        let resp = check(
            self.http
                .client
                .post(&url)
                .json(&EmbedRequest { texts })
                .send()
                .await?,
        )
        .await?;
        let body: EmbedResponse = resp.json().await?;
        Ok(body.vectors)
    }
}

#[async_trait]
impl TextEmbedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        self.post(texts).await.map_err(collaborator("embedder"))
    }
}

// ── Blobs ──

/// Fetches blobs by absolute URL.
pub struct HttpBlobSource {
    client: reqwest::Client,
}

impl Default for HttpBlobSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBlobSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>, SyncError> {
        info!(url = %uri, "fetching blob");
        let resp = check(self.client.get(uri).send().await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl BlobSource for HttpBlobSource {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.get(uri).await.map_err(collaborator("blob source"))
    }
}
