use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::llm;

/// Which embedding backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Remote Ollama service at `ollama_url`.
    Ollama,
    /// Deterministic in-process feature-hashing embedder. No network needed.
    Hash,
}

/// All tunable parameters for the RAG system.
///
/// Built once at startup from defaults, an optional JSON config file and
/// command-line overrides; read-only afterwards. Unrecognized keys in the
/// config file are ignored, missing keys fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub documents_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub model_name: String,
    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub ollama_url: String,
    pub temperature: f32,
    pub top_k: usize,
    pub prompt_template: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            documents_dir: PathBuf::from("data/documents"),
            index_dir: PathBuf::from("data/index"),
            chunk_size: 1000,
            chunk_overlap: 200,
            model_name: "deepseek-r1:1.5b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_backend: EmbeddingBackend::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            temperature: 0.0,
            top_k: 4,
            prompt_template: None,
        }
    }
}

impl RagConfig {
    /// Loads configuration from a flat JSON object on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| RagError::Config(format!("malformed config {}: {e}", path.display())))
    }

    /// Serializes every recognized field. `load` on the result round-trips.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Checks parameter consistency. Called once at startup so a bad
    /// template fails fast instead of on first use.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be positive".to_string()));
        }
        if let Some(template) = &self.prompt_template {
            llm::validate_template(template)?;
        }
        Ok(())
    }

    /// Creates the documents directory if missing. Idempotent.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.documents_dir)?;
        Ok(())
    }
}
