//! Embedding provider trait shared by ingestion and semantic retrieval

use async_trait::async_trait;

use crate::error::Result;

/// Trait for turning text into dense vectors
///
/// The same model must be used at ingestion and at query time, otherwise
/// similarities are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Vector length (768 for nomic-embed-text)
    fn dimensions(&self) -> usize;

    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;
}
