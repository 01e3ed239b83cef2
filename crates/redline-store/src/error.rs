use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("review {0} not found")]
    ReviewNotFound(i64),

    #[error("unknown reviewer action: {0:?}")]
    InvalidAction(String),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
