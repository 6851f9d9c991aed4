//! Configuration for the assistant
//!
//! Loading order: built-in defaults, then an optional TOML file named by
//! `R41_CONFIG`, then environment overrides, then [`RagConfig::validate`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Persisted index location
pub const ENV_VECTOR_STORE_PATH: &str = "VECTOR_STORE_PATH";
/// Embedding model identifier
pub const ENV_EMBEDDING_MODEL_ID: &str = "EMBEDDING_MODEL_ID";
/// Text generator model identifier
pub const ENV_GENERATOR_MODEL_ID: &str = "GENERATOR_MODEL_ID";
/// Secret for the generator backend
pub const ENV_API_CREDENTIAL: &str = "API_CREDENTIAL";
/// Optional TOML configuration file
pub const ENV_CONFIG_FILE: &str = "R41_CONFIG";
/// Optional explicit generator backend (`ollama` or `gemini`)
pub const ENV_BACKEND: &str = "R41_BACKEND";
/// Optional Ollama base URL
pub const ENV_OLLAMA_URL: &str = "OLLAMA_URL";
/// Optional server host / port
pub const ENV_HOST: &str = "R41_HOST";
pub const ENV_PORT: &str = "R41_PORT";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Generator backend
    pub backend: BackendProvider,
    /// Server configuration
    pub server: ServerConfig,
    /// Generator configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Hybrid retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Offline ingestion configuration
    pub ingestion: IngestionConfig,
    /// FAQ fast path configuration
    pub faq: FaqConfig,
    /// Pipeline orchestration configuration
    pub pipeline: PipelineConfig,
}

/// Generator backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Hosted Gemini API (requires an API credential)
    Gemini,
}

impl std::str::FromStr for BackendProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(Error::Config(format!("Unknown backend '{}'", other))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Allowed browser origins (empty = any)
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            max_body_size: 256 * 1024,
        }
    }
}

/// Text generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Gemini API base URL
    pub gemini_base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Output cap for answers
    pub max_output_tokens: u32,
    /// Output cap for rewrite / route / decompose calls
    pub max_stage_tokens: u32,
    /// Longest silence between response bytes, in seconds; a streamed answer
    /// may take longer in total
    pub timeout_secs: u64,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Generator secret; never serialized back out
    #[serde(skip_serializing)]
    pub api_credential: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.0,
            max_output_tokens: 256,
            max_stage_tokens: 128,
            timeout_secs: 120,
            connect_timeout_secs: 10,
            max_retries: 2,
            api_credential: None,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model served by Ollama
    pub model: String,
    /// Expected embedding dimensions (0 = accept whatever the model returns)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Path of the persisted index snapshot
    pub storage_path: PathBuf,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("r41-rag")
            .join("index.json");

        Self { storage_path }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Documents returned per query
    pub top_k: usize,
    /// Candidates fetched from the vector index before filtering / MMR
    pub fetch_k: usize,
    /// Fusion weight of the semantic retriever
    pub semantic_weight: f32,
    /// Fusion weight of the lexical retriever
    pub lexical_weight: f32,
    /// Reciprocal-rank constant
    pub rrf_k: f32,
    /// Semantic candidates below this cosine similarity are dropped
    pub min_similarity: f32,
    /// MMR trade-off (1.0 = pure relevance); `None` disables diversity reranking
    pub mmr_lambda: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            fetch_k: 20,
            semantic_weight: 0.5,
            lexical_weight: 0.5,
            rrf_k: 60.0,
            min_similarity: 0.3,
            mmr_lambda: None,
        }
    }
}

/// Offline ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory of markdown / text documents
    pub knowledge_dir: PathBuf,
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Minimum chunk size (skip smaller chunks)
    pub min_chunk_size: usize,
    /// Also index FAQ rows as `Q: ...\nA: ...` documents
    pub index_faq: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: PathBuf::from("data/knowledge_base"),
            chunk_size: 1000,
            chunk_overlap: 100,
            min_chunk_size: 20,
            index_faq: true,
        }
    }
}

/// FAQ fast path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqConfig {
    /// Enable the fast path
    pub enabled: bool,
    /// CSV file with `question,answer` columns
    pub path: PathBuf,
    /// Minimum token-set score (0-100) for a fast-path hit
    pub threshold: u8,
    /// Lower score accepted when the generator had no answer (CLI only)
    pub relaxed_threshold: u8,
    /// Only questions with fewer words than this try the fast path
    pub max_words: usize,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/faq.csv"),
            threshold: 85,
            relaxed_threshold: 70,
            max_words: 10,
        }
    }
}

/// Pipeline orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on sub-questions (and on retrieval fan-out)
    pub max_sub_questions: usize,
    /// Keep the rewritten question itself as the first sub-question
    pub include_original: bool,
    /// Capacity of the answer channel between producer and transport
    pub stream_buffer: usize,
    /// Answer with the fixed "don't know" sentence when context is empty
    pub short_circuit_empty_context: bool,
    /// End-to-end deadline per request in seconds
    pub deadline_secs: Option<u64>,
    /// Month (1-12) in which the academic year starts
    pub academic_year_start_month: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sub_questions: 8,
            include_original: true,
            stream_buffer: 32,
            short_circuit_empty_context: true,
            deadline_secs: Some(120),
            academic_year_start_month: 9,
        }
    }
}

impl RagConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(ENV_CONFIG_FILE) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file (missing sections keep their defaults)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = get(ENV_VECTOR_STORE_PATH) {
            self.vector_db.storage_path = PathBuf::from(path);
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL_ID) {
            self.embeddings.model = model;
        }
        let model_override = get(ENV_GENERATOR_MODEL_ID);
        if let Some(model) = &model_override {
            self.llm.generate_model = model.clone();
        }
        if let Some(secret) = get(ENV_API_CREDENTIAL) {
            self.llm.api_credential = Some(secret);
        }
        if let Some(url) = get(ENV_OLLAMA_URL) {
            self.llm.base_url = url;
        }
        if let Some(host) = get(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = get(ENV_PORT).and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        match get(ENV_BACKEND).map(|b| b.parse::<BackendProvider>()) {
            Some(Ok(backend)) => self.backend = backend,
            Some(Err(e)) => tracing::warn!("Ignoring {}: {}", ENV_BACKEND, e),
            None => {
                if model_override.is_some_and(|m| m.starts_with("gemini")) {
                    self.backend = BackendProvider::Gemini;
                }
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be greater than 0".to_string()));
        }
        if r.fetch_k < r.top_k {
            return Err(Error::Config("retrieval.fetch_k must be >= retrieval.top_k".to_string()));
        }
        if r.semantic_weight < 0.0 || r.lexical_weight < 0.0 {
            return Err(Error::Config("retrieval weights must be non-negative".to_string()));
        }
        if ((r.semantic_weight + r.lexical_weight) - 1.0).abs() > 1e-3 {
            return Err(Error::Config(format!(
                "retrieval weights must sum to 1.0 (got {} + {})",
                r.semantic_weight, r.lexical_weight
            )));
        }
        if r.rrf_k <= 0.0 {
            return Err(Error::Config("retrieval.rrf_k must be positive".to_string()));
        }
        if let Some(lambda) = r.mmr_lambda {
            if !(0.0..=1.0).contains(&lambda) {
                return Err(Error::Config("retrieval.mmr_lambda must be between 0.0 and 1.0".to_string()));
            }
        }

        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return Err(Error::Config("ingestion.chunk_overlap must be less than chunk_size".to_string()));
        }

        if self.faq.threshold > 100 || self.faq.relaxed_threshold > 100 {
            return Err(Error::Config("faq thresholds must be between 0 and 100".to_string()));
        }
        if self.faq.relaxed_threshold > self.faq.threshold {
            return Err(Error::Config("faq.relaxed_threshold must not exceed faq.threshold".to_string()));
        }

        if self.pipeline.max_sub_questions == 0 {
            return Err(Error::Config("pipeline.max_sub_questions must be greater than 0".to_string()));
        }
        if self.pipeline.stream_buffer == 0 {
            return Err(Error::Config("pipeline.stream_buffer must be greater than 0".to_string()));
        }
        if !(1..=12).contains(&self.pipeline.academic_year_start_month) {
            return Err(Error::Config("pipeline.academic_year_start_month must be 1-12".to_string()));
        }

        if self.backend == BackendProvider::Gemini && self.llm.api_credential.is_none() {
            return Err(Error::Config(format!(
                "Gemini backend selected but {} is not set",
                ENV_API_CREDENTIAL
            )));
        }

        Ok(())
    }
}
