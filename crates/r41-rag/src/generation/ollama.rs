//! Ollama HTTP client for embeddings and chat generation with retry logic

use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::llm::GenerationRequest;

use super::retry::retry_request;
use super::stream::{decode_lines, LineEvent, TokenStream};

/// Ollama API client with automatic retry
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    chat_model: String,
    embed_model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a client for `config.generate_model` and the given embedding model
    pub fn new(config: &LlmConfig, embed_model: impl Into<String>) -> Result<Self> {
        // no total timeout; timeout_secs bounds the gap between bytes
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.generate_model.clone(),
            embed_model: embed_model.into(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let url = url.as_str();

        retry_request("Embedding request", self.max_retries, || async move {
            let request = EmbedRequest {
                model: &self.embed_model,
                prompt: text,
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(Error::embedding(format!(
                    "Embedding failed: HTTP {}",
                    response.status()
                )));
            }

            let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                Error::embedding(format!("Failed to parse embedding response: {}", e))
            })?;

            if embed_response.embedding.is_empty() {
                return Err(Error::embedding("Ollama returned an empty embedding"));
            }

            Ok(embed_response.embedding)
        })
        .await
    }

    fn chat_body<'a>(&'a self, request: &'a GenerationRequest, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));

        ChatRequest {
            model: &self.chat_model,
            messages,
            stream,
            options: ChatOptions {
                temperature: request.temperature.unwrap_or(self.temperature),
                num_predict: request.max_tokens.unwrap_or(self.max_tokens),
            },
        }
    }

    async fn send_chat(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.chat_body(request, stream);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        Ok(response)
    }

    /// Non-streaming chat completion with retry
    pub async fn chat(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!("Generating with model: {}", self.chat_model);

        retry_request("Generation request", self.max_retries, || async move {
            let response = self.send_chat(request, false).await?;
            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| Error::llm(format!("Failed to parse generation response: {}", e)))?;

            if let Some(error) = chat.error {
                return Err(Error::llm(error));
            }
            Ok(chat.message.map(|m| m.content).unwrap_or_default())
        })
        .await
    }

    /// Streaming chat completion
    ///
    /// Only establishing the stream is retried; once fragments flow, a failure
    /// surfaces as an error item.
    pub async fn chat_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        tracing::debug!("Streaming with model: {}", self.chat_model);

        let response = retry_request("Generation stream", self.max_retries, || {
            self.send_chat(request, true)
        })
        .await?;

        Ok(decode_lines(response.bytes_stream().boxed(), parse_chat_line))
    }
}

/// Parse one NDJSON line of an Ollama `/api/chat` stream
pub(crate) fn parse_chat_line(line: &str) -> Result<LineEvent> {
    let chunk: ChatResponse = serde_json::from_str(line)
        .map_err(|e| Error::llm(format!("Malformed stream line: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(Error::llm(error));
    }

    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    match (text.is_empty(), chunk.done) {
        (false, _) => Ok(LineEvent::Token(text)),
        (true, true) => Ok(LineEvent::Done),
        (true, false) => Ok(LineEvent::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationHistory;

    fn client() -> OllamaClient {
        OllamaClient::new(&LlmConfig::default(), "nomic-embed-text").unwrap()
    }

    #[test]
    fn test_parse_chat_line() {
        assert_eq!(
            parse_chat_line(r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#).unwrap(),
            LineEvent::Token("Hi".to_string())
        );
        assert_eq!(
            parse_chat_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#).unwrap(),
            LineEvent::Done
        );
        assert!(parse_chat_line(r#"{"error":"model not found"}"#).is_err());
        assert!(parse_chat_line("not json").is_err());
    }

    #[test]
    fn test_chat_body_layout() {
        let client = client();
        let mut history = ConversationHistory::new();
        history.record_exchange("hi", "hello");
        let request = GenerationRequest::new("question")
            .with_system("be brief")
            .with_history(&history)
            .with_max_tokens(64);

        let body = serde_json::to_value(client.chat_body(&request, true)).unwrap();
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();

        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["model"], "llama3.2:3b");
    }

    async fn slow_chat() -> axum::response::Response {
        let lines = futures::stream::unfold(0usize, |n| async move {
            let line = match n {
                0..=3 => {
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    format!(
                        "{{\"message\":{{\"role\":\"assistant\",\"content\":\"w{} \"}},\"done\":false}}\n",
                        n
                    )
                }
                4 => "{\"done\":true}\n".to_string(),
                _ => return None,
            };
            Some((Ok::<_, std::io::Error>(bytes::Bytes::from(line)), n + 1))
        });
        axum::response::Response::new(axum::body::Body::from_stream(lines))
    }

    #[tokio::test]
    async fn test_stream_may_outlast_read_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route("/api/chat", axum::routing::post(slow_chat));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        // 1.6 s of streaming against a 1 s read timeout
        let config = LlmConfig {
            base_url: format!("http://{}", addr),
            timeout_secs: 1,
            max_retries: 0,
            ..Default::default()
        };
        let client = OllamaClient::new(&config, "nomic-embed-text").unwrap();
        let fragments: Vec<String> = client
            .chat_stream(&GenerationRequest::new("Tell me about R41"))
            .await
            .unwrap()
            .map(|fragment| fragment.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["w0 ", "w1 ", "w2 ", "w3 "]);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let client = OllamaClient::new(&config, "nomic-embed-text").unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
