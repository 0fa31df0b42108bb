use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("note context is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt note row {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}
