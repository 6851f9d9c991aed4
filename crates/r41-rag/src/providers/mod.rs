//! Provider abstractions for embeddings, generation and vector storage
//!
//! Trait-based so the pipeline can switch between a local Ollama backend and
//! the Gemini API, and so tests can inject scripted fakes.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use gemini::GeminiLlm;
pub use llm::{GenerationRequest, LlmProvider};
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use vector_store::{cosine_similarity, IndexedDocument, VectorSearchResult, VectorStoreProvider};
