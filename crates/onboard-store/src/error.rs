use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
