//! r41-rag: question answering about the R41 club
//!
//! A retrieval-augmented assistant. Each question is first checked against a
//! fuzzy FAQ table. Otherwise it is rewritten against the conversation,
//! routed in or out of domain, decomposed into search queries and answered
//! from a hybrid (embedding + BM25) index, with the answer streamed back
//! fragment by fragment.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod faq;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use bootstrap::{build_pipeline, RagRuntime};
pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{AnswerPipeline, AnswerStream, StageModels};
pub use types::{ChatRequest, ConversationHistory, Document, RetrievalResult, Role, Turn};
