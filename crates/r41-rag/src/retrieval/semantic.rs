//! Embedding-space retrieval with optional MMR diversity re-ranking

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::providers::{cosine_similarity, EmbeddingProvider, VectorSearchResult, VectorStoreProvider};
use crate::types::{RetrievalResult, ScoredDocument};

use super::Retriever;

/// Retriever that embeds the query and searches the vector store
pub struct SemanticRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    fetch_k: usize,
    min_similarity: f32,
    mmr_lambda: Option<f32>,
}

impl SemanticRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            fetch_k: config.fetch_k,
            min_similarity: config.min_similarity,
            mmr_lambda: config.mmr_lambda,
        }
    }
}

/// Maximal marginal relevance selection of `k` candidates
///
/// `lambda = 1.0` is pure relevance, `0.0` pure diversity.
pub fn mmr_select(
    query: &[f32],
    candidates: &[VectorSearchResult],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, &c.embedding))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &i) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&j| cosine_similarity(&candidates[i].embedding, &candidates[j].embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance[i] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[async_trait]
impl Retriever for SemanticRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let candidates: Vec<VectorSearchResult> = self
            .store
            .search(&query_embedding, self.fetch_k.max(k))
            .await?
            .into_iter()
            .filter(|c| c.similarity >= self.min_similarity)
            .collect();

        tracing::debug!(
            "Semantic retrieval: {} candidates above {:.2}",
            candidates.len(),
            self.min_similarity
        );

        let order: Vec<usize> = match self.mmr_lambda {
            Some(lambda) => mmr_select(&query_embedding, &candidates, k, lambda),
            None => (0..candidates.len().min(k)).collect(),
        };

        Ok(order
            .into_iter()
            .map(|i| ScoredDocument::new(candidates[i].document.clone(), candidates[i].similarity))
            .collect())
    }

    fn name(&self) -> &str {
        "semantic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{IndexedDocument, LocalVectorStore};
    use crate::types::Document;

    /// Embeds by looking the text up in a fixed table
    struct TableEmbedder(Vec<(&'static str, Vec<f32>)>);

    #[async_trait]
    impl EmbeddingProvider for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self
                .0
                .iter()
                .find(|(t, _)| *t == text)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    fn store() -> Arc<LocalVectorStore> {
        let entry = |text: &str, embedding: Vec<f32>| IndexedDocument {
            document: Document::new(text, "kb.md"),
            embedding,
        };
        Arc::new(LocalVectorStore::in_memory(vec![
            entry("meetings", vec![1.0, 0.0, 0.0]),
            entry("meetings again", vec![0.99, 0.05, 0.0]),
            entry("workshops", vec![0.7, 0.7, 0.0]),
            entry("unrelated", vec![0.0, 0.0, 1.0]),
        ]))
    }

    fn retriever(mmr_lambda: Option<f32>) -> SemanticRetriever {
        let config = RetrievalConfig {
            mmr_lambda,
            ..Default::default()
        };
        SemanticRetriever::new(
            Arc::new(TableEmbedder(vec![("when do we meet", vec![1.0, 0.0, 0.0])])),
            store(),
            &config,
        )
    }

    #[tokio::test]
    async fn test_similarity_order_and_threshold() {
        let results = retriever(None).retrieve("when do we meet", 10).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.document.content.as_str()).collect();
        // "unrelated" is orthogonal, below min_similarity
        assert_eq!(texts, vec!["meetings", "meetings again", "workshops"]);
    }

    #[tokio::test]
    async fn test_mmr_prefers_diverse_second_pick() {
        let results = retriever(Some(0.3)).retrieve("when do we meet", 2).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(texts, vec!["meetings", "workshops"]);
    }

    #[tokio::test]
    async fn test_zero_k() {
        assert!(retriever(None).retrieve("when do we meet", 0).await.unwrap().is_empty());
    }
}
