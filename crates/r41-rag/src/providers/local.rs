//! Local vector store persisted as a JSON snapshot
//!
//! The whole index is held in memory and searched by an exhaustive cosine
//! scan; the knowledge base of a single club is small enough for that. The
//! snapshot is only rewritten by ingestion, and queries never mutate it.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::Document;

use super::vector_store::{cosine_similarity, IndexedDocument, VectorSearchResult, VectorStoreProvider};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<IndexedDocument>,
}

/// In-memory vector index backed by a JSON file
pub struct LocalVectorStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<IndexedDocument>>>,
}

impl LocalVectorStore {
    /// Open the snapshot at `path`; a missing file yields an empty index
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| {
                Error::vector_db(format!("Corrupt index {}: {}", path.display(), e))
            })?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(Error::vector_db(format!(
                    "Unsupported index version {} in {}",
                    snapshot.version,
                    path.display()
                )));
            }
            snapshot.entries
        } else {
            tracing::warn!("No vector index at {}; starting empty", path.display());
            Vec::new()
        };

        tracing::info!("Loaded {} indexed passages from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Index that is never persisted, for tests and one-off runs
    pub fn in_memory(entries: Vec<IndexedDocument>) -> Self {
        Self {
            path: PathBuf::new(),
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(path: &Path, entries: &[IndexedDocument]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let snapshot = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "entries": entries,
        });
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn rank(entries: &[IndexedDocument], query: &[f32], top_k: usize) -> Vec<VectorSearchResult> {
    let mut scored: Vec<(usize, f32)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
        .collect();
    // stable: equal similarities keep insertion order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(top_k)
        .map(|(i, similarity)| VectorSearchResult {
            document: entries[i].document.clone(),
            embedding: entries[i].embedding.clone(),
            similarity,
        })
        .collect()
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let entries = Arc::clone(&self.entries);
        let query = query_embedding.to_vec();

        tokio::task::spawn_blocking(move || rank(&entries.read(), &query, top_k))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))
    }

    async fn replace_all(&self, entries: Vec<IndexedDocument>) -> Result<()> {
        if !self.path.as_os_str().is_empty() {
            let path = self.path.clone();
            let to_write = entries.clone();
            tokio::task::spawn_blocking(move || Self::persist(&path, &to_write))
                .await
                .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;
        }

        let count = entries.len();
        *self.entries.write() = entries;
        tracing::info!("Vector index replaced with {} passages", count);
        Ok(())
    }

    async fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.entries.read().iter().map(|e| e.document.clone()).collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local"
    }
}
