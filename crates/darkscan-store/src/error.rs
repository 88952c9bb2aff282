use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid feedback document: {0}")]
    Validation(String),

    #[error("cannot reach feedback store: {0}")]
    Connection(String),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
