//! Knowledge-base documents and their source tracking

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Source file types accepted by ingestion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Markdown file
    Markdown,
    /// Plain text file
    Txt,
    /// FAQ row from the CSV table
    Faq,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "txt" | "text" => Self::Txt,
            "csv" => Self::Faq,
            _ => Self::Unknown,
        }
    }

    /// Whether the knowledge-base walker should pick this file up
    pub fn is_knowledge_source(&self) -> bool {
        matches!(self, Self::Markdown | Self::Txt)
    }
}

/// A retrievable passage
///
/// Two documents are the same passage when their `content` is equal; the
/// source and metadata do not take part in deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Passage text
    pub content: String,
    /// Where the passage came from (relative path, or `faq`)
    pub source_id: String,
    /// Free-form metadata (chunk index, file type, FAQ question, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a document without metadata
    pub fn new(content: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Stable identifier derived from the content (hex SHA-256)
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether two documents hold the same passage
    pub fn same_content(&self, other: &Document) -> bool {
        self.content == other.content
    }
}

/// A document with the score assigned by the retriever that produced it
///
/// Scores are only comparable within one retriever's output.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}

/// Ranked output of one retrieval call, best first
pub type RetrievalResult = Vec<ScoredDocument>;
