//! DuckDB-backed document store.
//!
//! Each aggregate is stored as one JSON document per natural key:
//!
//! - `site_records` keyed by `(brd_id, site_id)`
//! - `legacy_records` keyed by `brd_id`
//! - `guidance_catalogs` keyed by catalog key
//!
//! Saves are `INSERT OR REPLACE`, so every save is an upsert and catalogs are
//! overwritten wholesale.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use duckdb::{Connection, params};
use onboard_core::{GuidanceEntry, LegacyRecord, SiteRecord};
use tracing::{debug, info};

use crate::{CatalogStore, LegacyStore, SiteStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS site_records (
    brd_id   VARCHAR NOT NULL,
    site_id  VARCHAR NOT NULL,
    id       VARCHAR NOT NULL,
    doc      VARCHAR NOT NULL,
    PRIMARY KEY (brd_id, site_id)
);
CREATE TABLE IF NOT EXISTS legacy_records (
    brd_id   VARCHAR PRIMARY KEY,
    doc      VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS guidance_catalogs (
    catalog_key VARCHAR PRIMARY KEY,
    doc         VARCHAR NOT NULL
);
";

/// Embedded store for site snapshots, legacy records, and guidance catalogs.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened onboard store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))
    }

    /// First column of the first row, if any.
    fn query_doc(
        conn: &Connection,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Option<String>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn count(conn: &Connection, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT FROM {table}");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Number of stored site records.
    pub fn site_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(Self::count(&conn, "site_records")? as usize)
    }
}

#[async_trait]
impl SiteStore for DuckStore {
    async fn find_by_brd_id_and_site_id(
        &self,
        brd_id: &str,
        site_id: &str,
    ) -> Result<Option<SiteRecord>, StoreError> {
        let conn = self.conn()?;
        let doc = Self::query_doc(
            &conn,
            "SELECT doc FROM site_records WHERE brd_id = ? AND site_id = ?",
            params![brd_id, site_id],
        )?;
        Ok(doc.map(|d| serde_json::from_str(&d)).transpose()?)
    }

    async fn save(&self, mut record: SiteRecord) -> Result<SiteRecord, StoreError> {
        let conn = self.conn()?;
        if record.id.is_none() {
            let existing = Self::query_doc(
                &conn,
                "SELECT id FROM site_records WHERE brd_id = ? AND site_id = ?",
                params![record.brd_id, record.site_id],
            )?;
            record.id = Some(match existing {
                Some(id) => id,
                None => format!("site-{}", Self::count(&conn, "site_records")? + 1),
            });
        }
        let id = record.id.clone().unwrap_or_default();
        let doc = serde_json::to_string(&record)?;
        conn.execute(
            "INSERT OR REPLACE INTO site_records (brd_id, site_id, id, doc) VALUES (?, ?, ?, ?)",
            params![record.brd_id, record.site_id, id, doc],
        )?;
        debug!(brd_id = %record.brd_id, site_id = %record.site_id, "saved site record");
        Ok(record)
    }
}

#[async_trait]
impl LegacyStore for DuckStore {
    async fn find_by_brd_id(&self, brd_id: &str) -> Result<Option<LegacyRecord>, StoreError> {
        let conn = self.conn()?;
        let doc = Self::query_doc(
            &conn,
            "SELECT doc FROM legacy_records WHERE brd_id = ?",
            params![brd_id],
        )?;
        Ok(doc.map(|d| serde_json::from_str(&d)).transpose()?)
    }

    async fn save(&self, record: LegacyRecord) -> Result<LegacyRecord, StoreError> {
        let doc = serde_json::to_string(&record)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO legacy_records (brd_id, doc) VALUES (?, ?)",
            params![record.brd_id, doc],
        )?;
        Ok(record)
    }
}

#[async_trait]
impl CatalogStore for DuckStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<GuidanceEntry>>, StoreError> {
        let conn = self.conn()?;
        let doc = Self::query_doc(
            &conn,
            "SELECT doc FROM guidance_catalogs WHERE catalog_key = ?",
            params![key],
        )?;
        Ok(doc.map(|d| serde_json::from_str(&d)).transpose()?)
    }

    async fn save(&self, key: &str, entries: &[GuidanceEntry]) -> Result<(), StoreError> {
        let doc = serde_json::to_string(entries)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO guidance_catalogs (catalog_key, doc) VALUES (?, ?)",
            params![key, doc],
        )?;
        info!(key, entries = entries.len(), "saved guidance catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_core::LegacyEntityInfo;

    #[tokio::test]
    async fn site_upsert_keeps_single_row() {
        let store = DuckStore::open().unwrap();
        let info = LegacyEntityInfo::new("S-1", "North");

        let first = SiteStore::save(&store, SiteRecord::new("BRD-1", &info))
            .await
            .unwrap();
        let second = SiteStore::save(&store, SiteRecord::new("BRD-1", &info))
            .await
            .unwrap();

        assert_eq!(store.site_count().unwrap(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(first.id.as_deref(), Some("site-1"));
    }

    #[tokio::test]
    async fn missing_rows_are_none() {
        let store = DuckStore::open().unwrap();
        assert!(
            store
                .find_by_brd_id_and_site_id("BRD-1", "S-1")
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.find_by_brd_id("BRD-1").await.unwrap().is_none());
        assert!(store.load("guidance").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persistent_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onboard.duckdb");
        {
            let store = DuckStore::open_persistent(&path).unwrap();
            let entries = vec![GuidanceEntry {
                mapping_key: Some("K1".into()),
                ..GuidanceEntry::candidate("Main")
            }];
            CatalogStore::save(&store, "guidance", &entries).await.unwrap();
        }
        let store = DuckStore::open_persistent(&path).unwrap();
        let loaded = store.load("guidance").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].mapping_key.as_deref(), Some("K1"));
    }

    #[tokio::test]
    async fn legacy_record_round_trip() {
        let store = DuckStore::open().unwrap();
        let mut record = LegacyRecord::new("BRD-1", LegacyEntityInfo::new("L-1", "Main"))
            .with_site(LegacyEntityInfo::new("S-1", "North"));
        LegacyStore::save(&store, record.clone()).await.unwrap();

        record.mark_site_prefilled("S-1");
        LegacyStore::save(&store, record).await.unwrap();

        let found = store.find_by_brd_id("BRD-1").await.unwrap().unwrap();
        assert_eq!(found.prefilled_sites, vec!["S-1"]);
    }
}
