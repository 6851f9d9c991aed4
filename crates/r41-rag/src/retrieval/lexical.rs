//! BM25 keyword retrieval over the indexed passages

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::types::{Document, RetrievalResult, ScoredDocument};

use super::Retriever;

/// Term-frequency saturation
pub const BM25_K1: f32 = 1.5;
/// Length normalisation
pub const BM25_B: f32 = 0.75;

/// Lowercased word tokens; single characters are dropped
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 2)
        .collect()
}

/// Immutable BM25 index built once from the knowledge base
#[derive(Debug, Default)]
pub struct Bm25Index {
    documents: Vec<Document>,
    term_freqs: Vec<HashMap<String, u32>>,
    lengths: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    avg_length: f32,
    k1: f32,
    b: f32,
}

impl Bm25Index {
    pub fn new(documents: Vec<Document>) -> Self {
        Self::with_params(documents, BM25_K1, BM25_B)
    }

    pub fn with_params(documents: Vec<Document>, k1: f32, b: f32) -> Self {
        let mut term_freqs = Vec::with_capacity(documents.len());
        let mut lengths = Vec::with_capacity(documents.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for doc in &documents {
            let tokens = tokenize(&doc.content);
            lengths.push(tokens.len());

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let avg_length = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f32 / lengths.len() as f32
        };

        tracing::debug!(
            "Built BM25 index: {} passages, {} terms",
            documents.len(),
            doc_freqs.len()
        );

        Self {
            documents,
            term_freqs,
            lengths,
            doc_freqs,
            avg_length,
            k1,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.doc_freqs.get(term).copied().unwrap_or(0);
        if df == 0 {
            return 0.0;
        }
        let n = self.documents.len() as f32;
        let df = df as f32;
        (1.0 + ((n - df + 0.5) / (df + 0.5)).max(0.0)).ln()
    }

    /// BM25 score of every passage for `query`, in index order
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let idfs: Vec<(String, f32)> = terms
            .into_iter()
            .map(|t| {
                let idf = self.idf(&t);
                (t, idf)
            })
            .filter(|(_, idf)| *idf > 0.0)
            .collect();

        self.term_freqs
            .iter()
            .zip(&self.lengths)
            .map(|(tf, &len)| {
                let norm = if self.avg_length > 0.0 {
                    1.0 - self.b + self.b * len as f32 / self.avg_length
                } else {
                    1.0
                };
                idfs.iter()
                    .map(|(term, idf)| {
                        let f = tf.get(term).copied().unwrap_or(0) as f32;
                        idf * f * (self.k1 + 1.0) / (f + self.k1 * norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Top `k` passages with a positive score; ties keep index order
    pub fn search(&self, query: &str, k: usize) -> RetrievalResult {
        let mut ranked: Vec<(usize, f32)> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredDocument::new(self.documents[i].clone(), score))
            .collect()
    }
}

/// Keyword retriever backed by a shared [`Bm25Index`]
pub struct LexicalRetriever {
    index: Arc<Bm25Index>,
}

impl LexicalRetriever {
    pub fn new(index: Arc<Bm25Index>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let results = self.index.search(query, k);
        tracing::debug!("Lexical retrieval: {} hits", results.len());
        Ok(results)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}
