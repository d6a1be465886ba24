use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the RAG pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("config error: {0}")]
    Config(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{provider} provider error: {message}")]
    Provider { provider: String, message: String },

    #[error("invalid prompt template: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        RagError::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
