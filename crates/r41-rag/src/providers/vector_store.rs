//! Vector store provider trait for embedding-space search

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Document;

/// A document stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedDocument {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// Search hit from the vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub document: Document,
    /// Stored embedding, kept for diversity re-ranking
    pub embedding: Vec<f32>,
    /// Cosine similarity, higher is more similar
    pub similarity: f32,
}

/// Trait for vector storage and similarity search
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Up to `top_k` entries ordered by descending similarity
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Replace the whole index with `entries`
    async fn replace_all(&self, entries: Vec<IndexedDocument>) -> Result<()>;

    /// Snapshot of every stored document, in insertion order
    async fn documents(&self) -> Result<Vec<Document>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
