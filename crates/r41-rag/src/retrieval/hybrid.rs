//! Weighted reciprocal-rank fusion of several retrievers

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Document, RetrievalResult, ScoredDocument};

use super::Retriever;

/// Default RRF smoothing constant
pub const DEFAULT_RRF_K: f32 = 60.0;

struct Component {
    retriever: Arc<dyn Retriever>,
    weight: f32,
}

/// Ensemble retriever
///
/// Each component is asked for `candidate_k` passages; a passage's fused score
/// is `sum(weight / (rrf_k + rank))` over the components that returned it,
/// with 1-based ranks. Ties are broken by component order: the earlier
/// component's rank decides first.
pub struct HybridRetriever {
    components: Vec<Component>,
    rrf_k: f32,
    candidate_k: usize,
    max_concurrency: usize,
}

struct Fused {
    document: Document,
    score: f32,
    ranks: Vec<usize>,
}

impl HybridRetriever {
    pub fn new(rrf_k: f32) -> Self {
        Self {
            components: Vec::new(),
            rrf_k,
            candidate_k: 0,
            max_concurrency: 8,
        }
    }

    /// Add a component; zero-weight components are never queried
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>, weight: f32) -> Self {
        self.components.push(Component {
            retriever,
            weight: weight.max(0.0),
        });
        self
    }

    /// Per-component candidate depth (at least `k` is always requested)
    pub fn with_candidate_k(mut self, candidate_k: usize) -> Self {
        self.candidate_k = candidate_k;
        self
    }

    /// Upper bound on concurrent queries in [`retrieve_many`](Self::retrieve_many)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    fn fuse(&self, outcomes: Vec<(usize, RetrievalResult)>, k: usize) -> RetrievalResult {
        let total_weight: f32 = outcomes
            .iter()
            .map(|(c, _)| self.components[*c].weight)
            .sum();
        if total_weight <= 0.0 {
            return Vec::new();
        }

        let slots = self.components.len();
        let mut fused: Vec<Fused> = Vec::new();
        let mut by_content: HashMap<String, usize> = HashMap::new();

        for (component, results) in outcomes {
            let weight = self.components[component].weight / total_weight;
            for (position, scored) in results.into_iter().enumerate() {
                let rank = position + 1;
                let slot = match by_content.get(&scored.document.content) {
                    Some(&slot) => slot,
                    None => {
                        by_content.insert(scored.document.content.clone(), fused.len());
                        fused.push(Fused {
                            document: scored.document,
                            score: 0.0,
                            ranks: vec![usize::MAX; slots],
                        });
                        fused.len() - 1
                    }
                };
                let entry = &mut fused[slot];
                // a component repeating a passage only counts its best rank
                if entry.ranks[component] == usize::MAX {
                    entry.ranks[component] = rank;
                    entry.score += weight / (self.rrf_k + rank as f32);
                }
            }
        }

        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ranks.cmp(&b.ranks))
        });

        fused
            .into_iter()
            .take(k)
            .map(|f| ScoredDocument::new(f.document, f.score))
            .collect()
    }

    /// Retrieve for each query independently
    ///
    /// Output order matches input order; queries run concurrently up to the
    /// configured bound.
    pub async fn retrieve_many(&self, queries: &[String], k: usize) -> Result<Vec<RetrievalResult>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let results: Vec<Result<RetrievalResult>> = stream::iter(queries.iter().cloned())
            .map(|query| async move { self.retrieve(&query, k).await })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        results.into_iter().collect()
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    /// Component failures are logged and skipped; the remaining weights are
    /// renormalised. All components failing yields an empty result.
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let depth = self.candidate_k.max(k);

        let active: Vec<usize> = (0..self.components.len())
            .filter(|&c| self.components[c].weight > 0.0)
            .collect();

        let calls = active.iter().map(|&c| {
            let component = &self.components[c];
            async move { (c, component.retriever.retrieve(query, depth).await) }
        });
        let responses = futures::future::join_all(calls).await;

        let mut outcomes = Vec::with_capacity(responses.len());
        for (c, response) in responses {
            match response {
                Ok(results) => outcomes.push((c, results)),
                Err(e) => tracing::warn!(
                    "{} retriever failed, continuing without it: {}",
                    self.components[c].retriever.name(),
                    e
                ),
            }
        }

        let fused = self.fuse(outcomes, k);
        tracing::debug!("Hybrid retrieval for {:?}: {} passages", query, fused.len());
        Ok(fused)
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed ranking regardless of the query
    struct Fixed {
        name: &'static str,
        contents: Vec<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, contents: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                contents,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                contents: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Retriever for Fixed {
        async fn retrieve(&self, _query: &str, k: usize) -> Result<RetrievalResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::vector_db("index offline"));
            }
            Ok(self
                .contents
                .iter()
                .take(k)
                .map(|c| ScoredDocument::new(Document::new(*c, self.name), 1.0))
                .collect())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn contents(results: &RetrievalResult) -> Vec<&str> {
        results.iter().map(|r| r.document.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_documents_found_by_both_rank_first() {
        let hybrid = HybridRetriever::new(DEFAULT_RRF_K)
            .with_retriever(Fixed::new("semantic", vec!["A", "B", "C"]), 0.5)
            .with_retriever(Fixed::new("lexical", vec!["C", "D"]), 0.5);

        let results = hybrid.retrieve("q", 4).await.unwrap();
        // C: 0.5/63 + 0.5/61 beats A: 0.5/61
        assert_eq!(contents(&results), vec!["C", "A", "B", "D"]);
    }

    #[tokio::test]
    async fn test_ties_broken_by_semantic_rank() {
        let hybrid = HybridRetriever::new(DEFAULT_RRF_K)
            .with_retriever(Fixed::new("semantic", vec!["A", "B"]), 0.5)
            .with_retriever(Fixed::new("lexical", vec!["B", "A"]), 0.5);

        let results = hybrid.retrieve("q", 2).await.unwrap();
        assert_eq!(contents(&results), vec!["A", "B"]);
        assert!((results[0].score - results[1].score).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_failed_component_is_skipped() {
        let hybrid = HybridRetriever::new(DEFAULT_RRF_K)
            .with_retriever(Fixed::failing("semantic"), 0.5)
            .with_retriever(Fixed::new("lexical", vec!["X", "Y"]), 0.5);

        let results = hybrid.retrieve("q", 5).await.unwrap();
        assert_eq!(contents(&results), vec!["X", "Y"]);
        // weight renormalised to 1.0
        assert!((results[0].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_all_components_failing_is_empty() {
        let hybrid = HybridRetriever::new(DEFAULT_RRF_K)
            .with_retriever(Fixed::failing("semantic"), 0.5)
            .with_retriever(Fixed::failing("lexical"), 0.5);
        assert!(hybrid.retrieve("q", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_weight_component_not_called() {
        let lexical = Fixed::new("lexical", vec!["L"]);
        let hybrid = HybridRetriever::new(DEFAULT_RRF_K)
            .with_retriever(Fixed::new("semantic", vec!["S"]), 1.0)
            .with_retriever(lexical.clone(), 0.0);

        let results = hybrid.retrieve("q", 5).await.unwrap();
        assert_eq!(contents(&results), vec!["S"]);
        assert_eq!(lexical.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_many() {
        let semantic = Fixed::new("semantic", vec!["A"]);
        let hybrid = HybridRetriever::new(DEFAULT_RRF_K).with_retriever(semantic.clone(), 1.0);

        assert!(hybrid.retrieve_many(&[], 3).await.unwrap().is_empty());
        assert_eq!(semantic.calls.load(Ordering::SeqCst), 0);

        let queries = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let results = hybrid.retrieve_many(&queries, 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(semantic.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrieve_many_on_spawned_task() {
        let semantic = Fixed::new("semantic", vec!["A", "B"]);
        let hybrid = Arc::new(HybridRetriever::new(DEFAULT_RRF_K).with_retriever(semantic.clone(), 1.0));

        let task = tokio::spawn(async move {
            let queries = vec!["first".to_string(), "second".to_string()];
            hybrid.retrieve_many(&queries, 2).await
        });
        let results = task.await.unwrap().unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(contents(&results[1]), vec!["A", "B"]);
        assert_eq!(semantic.calls.load(Ordering::SeqCst), 2);
    }
}
