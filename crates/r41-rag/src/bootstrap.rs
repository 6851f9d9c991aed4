//! Wiring: config → clients → indices → pipeline

use std::sync::Arc;

use crate::config::{BackendProvider, RagConfig};
use crate::error::Result;
use crate::faq::FaqMatcher;
use crate::generation::OllamaClient;
use crate::pipeline::{AnswerPipeline, StageModels};
use crate::providers::{
    EmbeddingProvider, GeminiLlm, LlmProvider, LocalVectorStore, OllamaEmbedder, OllamaLlm,
    VectorStoreProvider,
};
use crate::retrieval::{Bm25Index, HybridRetriever, LexicalRetriever, SemanticRetriever};

/// Model and storage backends selected by the configuration
#[derive(Clone)]
pub struct Backends {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub store: Arc<LocalVectorStore>,
}

/// Everything a front end needs to serve questions
#[derive(Clone)]
pub struct RagRuntime {
    pub config: Arc<RagConfig>,
    pub backends: Backends,
    pub faq: Option<Arc<FaqMatcher>>,
    pub pipeline: AnswerPipeline,
    /// Passages in the index at startup
    pub indexed_documents: usize,
}

/// Create the embedder, generator and vector store
///
/// Embeddings always come from Ollama; generation follows `config.backend`.
pub fn build_backends(config: &RagConfig) -> Result<Backends> {
    let ollama = Arc::new(OllamaClient::new(&config.llm, config.embeddings.model.clone())?);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::from_client(
        Arc::clone(&ollama),
        config.embeddings.dimensions,
    ));

    let llm: Arc<dyn LlmProvider> = match config.backend {
        BackendProvider::Ollama => Arc::new(OllamaLlm::from_client(ollama)),
        BackendProvider::Gemini => Arc::new(GeminiLlm::new(&config.llm)?),
    };

    let store = Arc::new(LocalVectorStore::open(&config.vector_db.storage_path)?);

    tracing::info!(
        "Backends: {} generator ({}), {} embeddings ({}), index at {}",
        llm.name(),
        llm.model(),
        embedder.name(),
        config.embeddings.model,
        config.vector_db.storage_path.display()
    );

    Ok(Backends { embedder, llm, store })
}

/// Load the FAQ table; a missing file disables the fast path
pub fn load_faq(config: &RagConfig) -> Result<Option<Arc<FaqMatcher>>> {
    if !config.faq.enabled {
        return Ok(None);
    }
    if !config.faq.path.exists() {
        tracing::warn!(
            "FAQ table {} not found; FAQ fast path disabled",
            config.faq.path.display()
        );
        return Ok(None);
    }
    Ok(Some(Arc::new(FaqMatcher::from_csv_path(&config.faq.path)?)))
}

/// Semantic + BM25 ensemble over the current index contents
pub async fn build_retriever(
    config: &RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
) -> Result<HybridRetriever> {
    let documents = store.documents().await?;
    let lexical = LexicalRetriever::new(Arc::new(Bm25Index::new(documents)));
    let semantic = SemanticRetriever::new(embedder, store, &config.retrieval);

    Ok(HybridRetriever::new(config.retrieval.rrf_k)
        .with_retriever(Arc::new(semantic), config.retrieval.semantic_weight)
        .with_retriever(Arc::new(lexical), config.retrieval.lexical_weight)
        .with_candidate_k(config.retrieval.fetch_k)
        .with_max_concurrency(config.pipeline.max_sub_questions))
}

/// Assemble the pipeline from already-built backends
pub async fn build_pipeline_with(
    config: RagConfig,
    backends: Backends,
    faq: Option<Arc<FaqMatcher>>,
) -> Result<RagRuntime> {
    let store: Arc<dyn VectorStoreProvider> = backends.store.clone();
    let indexed_documents = store.len().await?;
    if indexed_documents == 0 {
        tracing::warn!("Vector index is empty; run `r41-rag ingest` first");
    }

    let retriever = build_retriever(&config, Arc::clone(&backends.embedder), store).await?;
    let pipeline = AnswerPipeline::new(
        &config,
        StageModels::shared(Arc::clone(&backends.llm)),
        Arc::new(retriever),
        faq.clone(),
    );

    Ok(RagRuntime {
        config: Arc::new(config),
        backends,
        faq,
        pipeline,
        indexed_documents,
    })
}

/// Build everything from configuration
pub async fn build_pipeline(config: RagConfig) -> Result<RagRuntime> {
    config.validate()?;
    let backends = build_backends(&config)?;
    let faq = load_faq(&config)?;
    build_pipeline_with(config, backends, faq).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_faq_disables_fast_path() {
        let mut config = RagConfig::default();
        config.faq.path = "/no/such/faq.csv".into();
        assert!(load_faq(&config).unwrap().is_none());

        config.faq.enabled = false;
        assert!(load_faq(&config).unwrap().is_none());
    }

    #[test]
    fn test_faq_loaded_from_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("faq.csv");
        std::fs::write(&path, "question,answer\nWhat is R41?,A club.\n").unwrap();

        let mut config = RagConfig::default();
        config.faq.path = path;
        assert_eq!(load_faq(&config).unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_build_pipeline_with_empty_index() {
        let dir = tempdir().unwrap();
        let mut config = RagConfig::default();
        config.vector_db.storage_path = dir.path().join("index.json");
        config.faq.enabled = false;

        let runtime = tokio_test::assert_ok!(build_pipeline(config).await);
        assert_eq!(runtime.indexed_documents, 0);
        assert!(runtime.faq.is_none());
    }
}
