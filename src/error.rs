use crate::models::EngineKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Model not trained: {0}")]
    NotTrained(EngineKind),

    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
