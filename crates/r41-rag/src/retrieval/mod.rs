//! Hybrid retrieval: semantic and lexical retrievers fused by weighted RRF

pub mod context;
pub mod hybrid;
pub mod lexical;
pub mod semantic;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RetrievalResult;

pub use context::{dedupe, format_context};
pub use hybrid::HybridRetriever;
pub use lexical::{Bm25Index, LexicalRetriever};
pub use semantic::SemanticRetriever;

/// Anything that can rank knowledge-base passages for a query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages, best first
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult>;

    /// Name used in logs
    fn name(&self) -> &str;
}
