//! LLM provider trait for every text-generation stage

use async_trait::async_trait;
use futures::stream::StreamExt;

use crate::error::Result;
use crate::generation::TokenStream;
use crate::types::{ConversationHistory, Turn};

/// A chat-style generation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    /// Optional system instruction
    pub system: Option<String>,
    /// Conversation turns, the last one being the current user message
    pub messages: Vec<Turn>,
    /// Sampling temperature; provider default when `None`
    pub temperature: Option<f32>,
    /// Output cap in tokens; provider default when `None`
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Single user message
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Turn::user(prompt)],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Place prior turns before the current message
    pub fn with_history(mut self, history: &ConversationHistory) -> Self {
        let mut messages: Vec<Turn> = history.turns().to_vec();
        messages.append(&mut self.messages);
        self.messages = messages;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last message, i.e. the prompt being answered
    pub fn prompt(&self) -> &str {
        self.messages.last().map(|t| t.content.as_str()).unwrap_or("")
    }
}

/// Trait for LLM-based text generation
///
/// Implementations:
/// - `OllamaLlm`: local Ollama server (`/api/chat`)
/// - `GeminiLlm`: Gemini API with an API key
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate the full completion for a request
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate the completion as an incremental stream of fragments
    ///
    /// Default implementation yields the full completion as one fragment.
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        let text = self.generate(request).await?;
        Ok(futures::stream::once(async move { Ok(text) }).boxed())
    }

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
