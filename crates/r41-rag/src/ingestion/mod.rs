//! Offline knowledge-base ingestion
//!
//! Walks the knowledge directory for markdown and text files, converts them
//! to plain text, chunks them, embeds every chunk (plus the FAQ rows) and
//! destructively replaces the persisted vector index.

mod chunker;
mod markdown;

pub use chunker::TextChunker;
pub use markdown::markdown_to_text;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use crate::faq::FaqMatcher;
use crate::providers::{EmbeddingProvider, IndexedDocument, VectorStoreProvider};
use crate::types::{Document, FileType};

/// Texts embedded per provider call
const EMBED_BATCH_SIZE: usize = 16;

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub skipped_files: usize,
    pub chunks: usize,
    pub faq_rows: usize,
}

impl IngestReport {
    pub fn total_documents(&self) -> usize {
        self.chunks + self.faq_rows
    }
}

/// Builds the vector index from the knowledge directory
pub struct Ingestor {
    config: IngestionConfig,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
}

impl Ingestor {
    pub fn new(
        config: IngestionConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)
            .with_min_size(config.min_chunk_size);
        Self {
            config,
            chunker,
            embedder,
            store,
        }
    }

    /// Chunk every knowledge file under `dir`, in path order
    pub fn collect_documents(&self, dir: &Path) -> Result<(Vec<Document>, IngestReport)> {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "Knowledge base directory not found: {}",
                dir.display()
            )));
        }

        let mut documents = Vec::new();
        let mut report = IngestReport::default();

        let walker = WalkDir::new(dir).sort_by_file_name().into_iter();
        for entry in walker {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let file_type = path
                .extension()
                .and_then(|e| e.to_str())
                .map(FileType::from_extension)
                .unwrap_or(FileType::Unknown);
            if !file_type.is_knowledge_source() {
                tracing::debug!("Skipping {}", path.display());
                report.skipped_files += 1;
                continue;
            }

            let raw = match std::fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {}: {}", path.display(), e);
                    report.skipped_files += 1;
                    continue;
                }
            };

            let text = match file_type {
                FileType::Markdown => markdown_to_text(&raw),
                _ => raw,
            };
            let source_id = relative_source(dir, path);
            let chunks = self.chunker.chunk(&text);
            tracing::debug!("{}: {} chunks", source_id, chunks.len());

            for (index, chunk) in chunks.into_iter().enumerate() {
                let document = Document::new(chunk, source_id.clone())
                    .with_metadata("chunk_index", serde_json::json!(index))
                    .with_metadata("file_type", serde_json::json!(file_type));
                let hash = document.content_hash();
                documents.push(document.with_metadata("content_hash", serde_json::json!(hash)));
                report.chunks += 1;
            }
            report.files += 1;
        }

        Ok((documents, report))
    }

    /// Rebuild the index from the configured directory and optional FAQ table
    ///
    /// `on_progress(done, total)` is called after every embedding batch.
    pub async fn ingest<P>(&self, faq: Option<&FaqMatcher>, on_progress: P) -> Result<IngestReport>
    where
        P: Fn(usize, usize) + Send + Sync,
    {
        let (mut documents, mut report) = self.collect_documents(&self.config.knowledge_dir)?;

        if self.config.index_faq {
            if let Some(faq) = faq {
                documents.extend(faq.entries().iter().map(|e| e.to_document()));
                report.faq_rows = faq.len();
            }
        }

        if documents.is_empty() {
            tracing::warn!("Nothing to index; the vector index will be empty");
        }

        let total = documents.len();
        let mut entries = Vec::with_capacity(total);
        for batch in documents.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            entries.extend(batch.iter().cloned().zip(embeddings).map(|(document, embedding)| {
                IndexedDocument { document, embedding }
            }));
            on_progress(entries.len(), total);
        }

        self.store.replace_all(entries).await?;

        tracing::info!(
            "Indexed {} chunks from {} files and {} FAQ rows ({} files skipped)",
            report.chunks,
            report.files,
            report.faq_rows,
            report.skipped_files
        );
        Ok(report)
    }
}

fn relative_source(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faq::FaqEntry;
    use crate::providers::LocalVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Embeds text as its length, enough to check plumbing
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_ingest_replaces_index() {
        let kb = tempdir().unwrap();
        write(kb.path(), "about.md", "# About\n\nR41 is the robotics club of ENSAB, founded by students.");
        write(kb.path(), "events/2025.txt", "The robotics night takes place every December in the main hall.");
        write(kb.path(), "logo.png", "not text");

        let config = IngestionConfig {
            knowledge_dir: kb.path().to_path_buf(),
            ..Default::default()
        };
        let store = Arc::new(LocalVectorStore::in_memory(Vec::new()));
        let ingestor = Ingestor::new(config, Arc::new(LengthEmbedder), store.clone());
        let faq = FaqMatcher::new(vec![FaqEntry::new("What is R41?", "A student club.")]);

        let calls = AtomicUsize::new(0);
        let report = ingestor
            .ingest(Some(&faq), |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.faq_rows, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let docs = store.documents().await.unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source_id.as_str()).collect();
        assert_eq!(sources, vec!["about.md", "events/2025.txt", "faq"]);
        assert!(docs[0].content.starts_with("About."));
        assert_eq!(docs[2].content, "Q: What is R41?\nA: A student club.");
        assert_eq!(
            docs[0].metadata["content_hash"],
            serde_json::json!(docs[0].content_hash())
        );
    }

    #[test]
    fn test_missing_directory() {
        let config = IngestionConfig {
            knowledge_dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        let ingestor = Ingestor::new(
            config.clone(),
            Arc::new(LengthEmbedder),
            Arc::new(LocalVectorStore::in_memory(Vec::new())),
        );
        assert!(ingestor.collect_documents(&config.knowledge_dir).is_err());
    }
}
