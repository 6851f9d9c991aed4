//! Gemini API client for generation, authenticated with an API key

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::retry::retry_request;
use crate::generation::stream::{decode_lines, LineEvent, TokenStream};
use crate::types::Role;

use super::llm::{GenerationRequest, LlmProvider};

/// Gemini `generateContent` client
pub struct GeminiLlm {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        Some(content.parts.into_iter().map(|p| p.text).collect())
    }
}

impl GeminiLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_credential
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("Gemini backend requires API_CREDENTIAL".to_string()))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.generate_model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn build_body(&self, request: &GenerationRequest) -> GenerateRequest {
        GenerateRequest {
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part { text: s.clone() }],
            }),
            contents: request
                .messages
                .iter()
                .map(|turn| Content {
                    role: Some(match turn.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }),
                    parts: vec![Part {
                        text: turn.content.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            },
        }
    }

    async fn post(&self, url: &str, body: &GenerateRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Gemini generation failed ({}): {}",
                status, body
            )));
        }

        Ok(response)
    }
}

/// Parse one line of a `streamGenerateContent?alt=sse` response
fn parse_sse_line(line: &str) -> Result<LineEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(LineEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    let chunk: GenerateResponse = serde_json::from_str(data)
        .map_err(|e| Error::llm(format!("Malformed Gemini stream event: {}", e)))?;
    match chunk.text() {
        Some(text) if !text.is_empty() => Ok(LineEvent::Token(text)),
        _ => Ok(LineEvent::Skip),
    }
}

#[async_trait]
impl LlmProvider for GeminiLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = self.endpoint("generateContent");
        let body = self.build_body(request);
        let (url, body) = (url.as_str(), &body);

        retry_request("Gemini request", self.max_retries, || async move {
            let response: GenerateResponse = self
                .post(url, body)
                .await?
                .json()
                .await
                .map_err(|e| Error::llm(format!("Failed to parse Gemini response: {}", e)))?;

            response
                .text()
                .ok_or_else(|| Error::llm("No text in Gemini response"))
        })
        .await
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let body = self.build_body(request);

        let response = retry_request("Gemini stream", self.max_retries, || {
            self.post(&url, &body)
        })
        .await?;

        Ok(decode_lines(response.bytes_stream(), parse_sse_line))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
