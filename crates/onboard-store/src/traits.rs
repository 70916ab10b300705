use async_trait::async_trait;
use onboard_core::{GuidanceEntry, LegacyRecord, SiteRecord};

use crate::StoreError;

/// Site form snapshots keyed by `(brd_id, site_id)`.
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn find_by_brd_id_and_site_id(
        &self,
        brd_id: &str,
        site_id: &str,
    ) -> Result<Option<SiteRecord>, StoreError>;

    /// Upsert by `(brd_id, site_id)`. Assigns `id` on first save.
    async fn save(&self, record: SiteRecord) -> Result<SiteRecord, StoreError>;
}

/// Legacy BRD records keyed by the new BRD's id.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    async fn find_by_brd_id(&self, brd_id: &str) -> Result<Option<LegacyRecord>, StoreError>;

    async fn save(&self, record: LegacyRecord) -> Result<LegacyRecord, StoreError>;
}

/// Guidance catalogs, stored whole under a key and always overwritten.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<GuidanceEntry>>, StoreError>;

    async fn save(&self, key: &str, entries: &[GuidanceEntry]) -> Result<(), StoreError>;
}
