use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::document::Chunk;
use crate::embedding::Embedder;
use crate::error::Result;

const INDEX_FILE: &str = "index.json";

/// One embedded chunk as persisted in the index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: String,
    pub text: String,
    pub source: PathBuf,
    pub offset: usize,
    pub embedding: Array1<f32>,
}

/// A retrieval hit, most similar first in the result vector.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub text: String,
    pub source: PathBuf,
    pub score: f32,
}

/// Persistent brute-force vector index over embedded chunks.
///
/// The index owns its storage directory exclusively; exactly one process
/// is assumed to hold a handle at a time. Concurrent processes pointed at
/// the same directory are unsupported.
pub struct VectorDb {
    dir: PathBuf,
    entries: Vec<IndexedEntry>,
    embedder: Box<dyn Embedder>,
}

impl VectorDb {
    /// Opens the index at `dir` if it exists, otherwise builds it.
    ///
    /// An existing index is never overwritten: `chunks` are ignored when
    /// the index file is already present. With no index and no chunks an
    /// empty index is created and persisted, so subsequent runs load it.
    pub fn open_or_build(
        dir: impl AsRef<Path>,
        embedder: Box<dyn Embedder>,
        chunks: Option<Vec<Chunk>>,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let index_file = dir.join(INDEX_FILE);

        if index_file.is_file() {
            let raw = fs::read_to_string(&index_file)?;
            let entries: Vec<IndexedEntry> = serde_json::from_str(&raw)?;
            info!(entries = entries.len(), dir = %dir.display(), "loaded existing index");
            return Ok(VectorDb {
                dir,
                entries,
                embedder,
            });
        }

        let mut db = VectorDb {
            dir,
            entries: Vec::new(),
            embedder,
        };
        if let Some(chunks) = chunks {
            db.embed_and_append(chunks)?;
        }
        db.persist()?;
        info!(entries = db.entries.len(), dir = %db.dir.display(), "built index");
        Ok(db)
    }

    pub fn is_built(dir: impl AsRef<Path>) -> bool {
        dir.as_ref().join(INDEX_FILE).is_file()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embeds and appends chunks, leaving existing entries untouched.
    pub fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        self.embed_and_append(chunks)?;
        self.persist()
    }

    /// Returns the `k` entries most similar to `query` by cosine
    /// similarity, best first. Ties are broken by entry id so ordering is
    /// stable within a run. An empty index short-circuits without
    /// touching the embedding provider.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Retrieved>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query)?;
        let mut scored: Vec<(f32, &IndexedEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.embedding, &query_embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| Retrieved {
                text: entry.text.clone(),
                source: entry.source.clone(),
                score,
            })
            .collect())
    }

    /// Deletes all persisted entries and the storage directory. Idempotent.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn embed_and_append(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        // All-or-nothing: one failed embedding fails the whole batch
        // rather than dropping chunks.
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            self.entries.push(IndexedEntry {
                id: uuid::Uuid::new_v4().to_string(),
                text: chunk.text,
                source: chunk.source,
                offset: chunk.offset,
                embedding,
            });
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let raw = serde_json::to_string(&self.entries)?;
        fs::write(self.dir.join(INDEX_FILE), raw)?;
        Ok(())
    }
}

fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(b) / (norm_a * norm_b)
    }
}
