//! In-memory store for tests and one-shot CLI runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use onboard_core::{GuidanceEntry, LegacyRecord, SiteRecord};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{CatalogStore, LegacyStore, SiteStore, StoreError};

/// Process-local implementation of every store trait.
#[derive(Default)]
pub struct MemoryStore {
    sites: RwLock<HashMap<(String, String), SiteRecord>>,
    legacy: RwLock<HashMap<String, LegacyRecord>>,
    catalogs: RwLock<HashMap<String, Vec<GuidanceEntry>>>,
    next_site_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored site records.
    pub async fn site_count(&self) -> usize {
        self.sites.read().await.len()
    }

    /// All site records for a BRD, ordered by site id.
    pub async fn sites_for(&self, brd_id: &str) -> Vec<SiteRecord> {
        let mut sites: Vec<SiteRecord> = self
            .sites
            .read()
            .await
            .values()
            .filter(|s| s.brd_id == brd_id)
            .cloned()
            .collect();
        sites.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        sites
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn find_by_brd_id_and_site_id(
        &self,
        brd_id: &str,
        site_id: &str,
    ) -> Result<Option<SiteRecord>, StoreError> {
        let key = (brd_id.to_string(), site_id.to_string());
        Ok(self.sites.read().await.get(&key).cloned())
    }

    async fn save(&self, mut record: SiteRecord) -> Result<SiteRecord, StoreError> {
        let key = (record.brd_id.clone(), record.site_id.clone());
        let mut sites = self.sites.write().await;
        if record.id.is_none() {
            // Keep the id of an existing record under the same natural key.
            record.id = match sites.get(&key).and_then(|s| s.id.clone()) {
                Some(id) => Some(id),
                None => {
                    let n = self.next_site_id.fetch_add(1, Ordering::Relaxed) + 1;
                    Some(format!("site-{n}"))
                }
            };
        }
        debug!(brd_id = %record.brd_id, site_id = %record.site_id, "saved site record");
        sites.insert(key, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl LegacyStore for MemoryStore {
    async fn find_by_brd_id(&self, brd_id: &str) -> Result<Option<LegacyRecord>, StoreError> {
        Ok(self.legacy.read().await.get(brd_id).cloned())
    }

    async fn save(&self, record: LegacyRecord) -> Result<LegacyRecord, StoreError> {
        self.legacy
            .write()
            .await
            .insert(record.brd_id.clone(), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<GuidanceEntry>>, StoreError> {
        Ok(self.catalogs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, entries: &[GuidanceEntry]) -> Result<(), StoreError> {
        self.catalogs
            .write()
            .await
            .insert(key.to_string(), entries.to_vec());
        debug!(key, entries = entries.len(), "saved guidance catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_core::LegacyEntityInfo;
    use serde_json::{Map, json};

    fn site(id: &str) -> LegacyEntityInfo {
        LegacyEntityInfo::new(id, format!("Site {id}"))
    }

    #[tokio::test]
    async fn site_save_assigns_id() {
        let store = MemoryStore::new();
        let saved = SiteStore::save(&store, SiteRecord::new("BRD-1", &site("S-1")))
            .await
            .unwrap();
        assert_eq!(saved.id.as_deref(), Some("site-1"));
    }

    #[tokio::test]
    async fn site_save_upserts_by_natural_key() {
        let store = MemoryStore::new();
        let first = SiteStore::save(&store, SiteRecord::new("BRD-1", &site("S-1")))
            .await
            .unwrap();

        // A fresh record for the same (brd, site) must not duplicate.
        let mut again = SiteRecord::new("BRD-1", &site("S-1"));
        let mut form = Map::new();
        form.insert("general".into(), json!({"name": "North"}));
        again.replace_form(form);
        let second = SiteStore::save(&store, again).await.unwrap();

        assert_eq!(store.site_count().await, 1);
        assert_eq!(first.id, second.id);
        let found = store
            .find_by_brd_id_and_site_id("BRD-1", "S-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.form["general"]["name"], "North");
    }

    #[tokio::test]
    async fn sites_are_scoped_by_brd() {
        let store = MemoryStore::new();
        SiteStore::save(&store, SiteRecord::new("BRD-1", &site("S-2")))
            .await
            .unwrap();
        SiteStore::save(&store, SiteRecord::new("BRD-1", &site("S-1")))
            .await
            .unwrap();
        SiteStore::save(&store, SiteRecord::new("BRD-2", &site("S-1")))
            .await
            .unwrap();

        let sites = store.sites_for("BRD-1").await;
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].site_id, "S-1");
        assert!(
            store
                .find_by_brd_id_and_site_id("BRD-3", "S-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn legacy_round_trip() {
        let store = MemoryStore::new();
        assert!(store.find_by_brd_id("BRD-1").await.unwrap().is_none());

        let record = LegacyRecord::new("BRD-1", LegacyEntityInfo::new("L-1", "Main"))
            .with_site(site("S-1"));
        LegacyStore::save(&store, record).await.unwrap();

        let found = store.find_by_brd_id("BRD-1").await.unwrap().unwrap();
        assert_eq!(found.sites.len(), 1);
    }

    #[tokio::test]
    async fn catalog_save_overwrites() {
        let store = MemoryStore::new();
        let entries = vec![GuidanceEntry::candidate("a"), GuidanceEntry::candidate("b")];
        CatalogStore::save(&store, "guidance", &entries).await.unwrap();
        CatalogStore::save(&store, "guidance", &entries[..1]).await.unwrap();

        let loaded = store.load("guidance").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(store.load("other").await.unwrap().is_none());
    }
}
