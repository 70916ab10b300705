//! In-process collaborators for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use onboard_core::{
    BlobSource, CollaboratorError, FormResponse, FormService, FormUpdate, GuidanceEntry,
    LegacyRecord, PrefillGenerator, SemanticMatcher,
};
use onboard_store::{LegacyStore, MemoryStore, StoreError};
use serde_json::Value;

// ── Blobs ──

#[derive(Default)]
pub struct MapBlobs {
    blobs: HashMap<String, Vec<u8>>,
}

impl MapBlobs {
    pub fn with(mut self, uri: &str, body: &str) -> Self {
        self.blobs.insert(uri.to_string(), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl BlobSource for MapBlobs {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.blobs
            .get(uri)
            .cloned()
            .ok_or_else(|| CollaboratorError::msg("blob source", format!("no blob at {uri}")))
    }
}

// ── Matcher ──

/// Assigns mapping keys from a fixed label table and counts calls.
#[derive(Default)]
pub struct TableMatcher {
    table: HashMap<String, String>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl TableMatcher {
    pub fn mapping(mut self, label: &str, key: &str) -> Self {
        self.table.insert(label.to_string(), key.to_string());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticMatcher for TableMatcher {
    async fn find_matches(
        &self,
        candidates: Vec<GuidanceEntry>,
    ) -> Result<Vec<GuidanceEntry>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::msg("semantic matcher", "service unavailable"));
        }
        Ok(candidates
            .into_iter()
            .map(|mut c| {
                if let Some(key) = self.table.get(&c.source_name) {
                    c.mapping_key = Some(key.clone());
                    c.similarity = Some("0.9000".into());
                }
                c
            })
            .collect())
    }
}

// ── Form service ──

/// Serves one form and records every partial update.
pub struct StubForms {
    form: Option<FormResponse>,
    update_reply: Option<FormResponse>,
    fail_get: bool,
    fail_update: bool,
    pub updates: Mutex<Vec<(String, FormUpdate)>>,
}

impl StubForms {
    pub fn serving(data: Value) -> Self {
        Self {
            form: Some(FormResponse::with_data(data)),
            update_reply: Some(FormResponse::with_data(serde_json::json!({}))),
            fail_get: false,
            fail_update: false,
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn missing() -> Self {
        Self {
            form: None,
            ..Self::serving(Value::Null)
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_get: true,
            ..Self::serving(Value::Null)
        }
    }

    pub fn replying(mut self, reply: Option<FormResponse>) -> Self {
        self.update_reply = reply;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_update = true;
        self
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl FormService for StubForms {
    async fn get_form(&self, _brd_id: &str) -> Result<Option<FormResponse>, CollaboratorError> {
        if self.fail_get {
            return Err(CollaboratorError::msg("form service", "connection refused"));
        }
        Ok(self.form.clone())
    }

    async fn update_partial(
        &self,
        brd_id: &str,
        update: &FormUpdate,
    ) -> Result<Option<FormResponse>, CollaboratorError> {
        self.updates
            .lock()
            .unwrap()
            .push((brd_id.to_string(), update.clone()));
        if self.fail_update {
            return Err(CollaboratorError::msg("form service", "timeout"));
        }
        Ok(self.update_reply.clone())
    }
}

// ── Prefill generator ──

#[derive(Debug, Clone, PartialEq)]
pub enum GenerateCall {
    Unscoped,
    Scoped { context: String, label: String },
}

/// Replies per label (the main record's id or a site id), or with a default.
pub struct ScriptedGenerator {
    default_reply: Option<Value>,
    replies: HashMap<String, Option<Value>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<GenerateCall>>,
    pub bases: Mutex<Vec<Value>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: Value) -> Self {
        Self {
            default_reply: Some(reply),
            replies: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            bases: Mutex::new(Vec::new()),
        }
    }

    /// Reply for one label; `None` simulates "no response data".
    pub fn with_reply(mut self, label: &str, reply: Option<Value>) -> Self {
        self.replies.insert(label.to_string(), reply);
        self
    }

    pub fn failing_for(mut self, label: &str) -> Self {
        self.failing.insert(label.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scoped_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GenerateCall::Scoped { .. }))
            .count()
    }

    pub fn unscoped_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GenerateCall::Unscoped))
            .count()
    }

    async fn reply(&self, base: &Value, label: Option<&str>) -> Result<Option<Value>, CollaboratorError> {
        self.bases.lock().unwrap().push(base.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(label) = label {
            if self.failing.contains(label) {
                return Err(CollaboratorError::msg("prefill generator", "model overloaded"));
            }
            if let Some(reply) = self.replies.get(label) {
                return Ok(reply.clone());
            }
        }
        Ok(self.default_reply.clone())
    }
}

#[async_trait]
impl PrefillGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        base: &Value,
        _document_names: &[String],
    ) -> Result<Option<Value>, CollaboratorError> {
        self.calls.lock().unwrap().push(GenerateCall::Unscoped);
        self.reply(base, None).await
    }

    async fn generate_scoped(
        &self,
        base: &Value,
        _document_names: &[String],
        context_name: &str,
        label: &str,
    ) -> Result<Option<Value>, CollaboratorError> {
        self.calls.lock().unwrap().push(GenerateCall::Scoped {
            context: context_name.to_string(),
            label: label.to_string(),
        });
        self.reply(base, Some(label)).await
    }
}

// ── Stores ──

/// Legacy store whose writes always fail.
#[derive(Default)]
pub struct ReadOnlyLegacy {
    pub inner: MemoryStore,
}

#[async_trait]
impl LegacyStore for ReadOnlyLegacy {
    async fn find_by_brd_id(&self, brd_id: &str) -> Result<Option<LegacyRecord>, StoreError> {
        self.inner.find_by_brd_id(brd_id).await
    }

    async fn save(&self, _record: LegacyRecord) -> Result<LegacyRecord, StoreError> {
        Err(StoreError::Other("legacy store is read-only".into()))
    }
}
