//! Storage layer: site snapshots, legacy records, and guidance catalogs.
//!
//! [`MemoryStore`] serves tests and ephemeral runs; [`DuckStore`] (feature
//! `duckdb`) persists the same documents in an embedded database.

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{CatalogStore, LegacyStore, SiteStore};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
