use lazy_static::lazy_static;
use ndarray::Array1;
use regex::Regex;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::config::{EmbeddingBackend, RagConfig};
use crate::error::{RagError, Result};

/// Capability for turning text into vectors.
///
/// The index embeds chunks at build time and queries at retrieval time
/// through the same handle; mixing embedders across those two calls is a
/// caller error that is not detected here.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Embeds a batch, failing it wholesale on the first error so an index
    /// build never silently drops chunks.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        texts.iter().map(|&text| self.embed(text)).collect()
    }
}

/// Constructs the embedder selected by the configuration.
pub fn from_config(config: &RagConfig) -> Box<dyn Embedder> {
    match config.embedding_backend {
        EmbeddingBackend::Ollama => Box::new(OllamaEmbedder::new(
            &config.ollama_url,
            &config.embedding_model,
        )),
        EmbeddingBackend::Hash => Box::new(HashEmbedder::default()),
    }
}

// ── Remote provider ────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server (`POST /api/embeddings`).
pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        OllamaEmbedder {
            client: reqwest::blocking::Client::new(),
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .map_err(|e| RagError::provider("embedding", e))?
            .error_for_status()
            .map_err(|e| RagError::provider("embedding", e))?;

        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| RagError::provider("embedding", e))?;
        debug!(model = %self.model, dims = body.embedding.len(), "embedded text");
        Ok(Array1::from(body.embedding))
    }
}

// ── Local provider ─────────────────────────────────────────────────

const HASH_DIMENSIONS: usize = 256;

/// Deterministic in-process embedder: feature-hashed bag of words.
///
/// Tokens are NFC-normalized, lowercased, stripped of punctuation and stop
/// words, then hashed into a fixed number of buckets; the bucket counts are
/// L2-normalized. Identical texts always map to identical vectors, which is
/// what retrieval tests and offline runs rely on. Not a substitute for a
/// learned embedding model.
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        HashEmbedder {
            dimensions: HASH_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    fn tokenize(text: &str) -> Vec<String> {
        lazy_static! {
            static ref PUNCTUATION: Regex = Regex::new(r"[^\w\s]").unwrap();
            static ref STOP_WORDS: FxHashSet<&'static str> = [
                "a", "an", "and", "are", "as", "at", "be", "by", "for", "from",
                "has", "he", "in", "is", "it", "its", "of", "on", "that", "the",
                "to", "was", "were", "will", "with",
            ]
            .into_iter()
            .collect();
        }

        let text = text.nfc().collect::<String>().to_lowercase();
        let text = PUNCTUATION.replace_all(&text, " ");
        text.split_whitespace()
            .filter(|token| !STOP_WORDS.contains(token))
            .map(str::to_string)
            .collect()
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let mut buckets = vec![0.0f32; self.dimensions];
        for token in Self::tokenize(text) {
            let mut hasher = FxHasher::default();
            token.hash(&mut hasher);
            buckets[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }

        let mut vector = Array1::from(buckets);
        let norm = vector.dot(&vector).sqrt();
        if norm > 0.0 {
            vector /= norm;
        }
        Ok(vector)
    }
}
