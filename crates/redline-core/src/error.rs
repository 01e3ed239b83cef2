use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("rulebook not found: {0}")]
    RulebookNotFound(std::path::PathBuf),

    #[error("invalid rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
