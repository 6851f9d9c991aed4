//! Ollama-based providers for embeddings and generation
//!
//! Both wrap a shared [`OllamaClient`] so one connection pool serves every
//! pipeline stage.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::generation::{OllamaClient, TokenStream};

use super::embedding::EmbeddingProvider;
use super::llm::{GenerationRequest, LlmProvider};

/// Ollama embedding provider (nomic-embed-text or similar)
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }

    pub fn model(&self) -> &str {
        self.client.embed_model()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat model used for every generation stage
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
}

impl OllamaLlm {
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.client.chat(request).await
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        self.client.chat_stream(request).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        self.client.chat_model()
    }
}
