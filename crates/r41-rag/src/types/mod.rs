//! Core types shared by the pipeline stages

pub mod conversation;
pub mod document;
pub mod query;

pub use conversation::{ConversationHistory, Role, Turn};
pub use document::{Document, FileType, RetrievalResult, ScoredDocument};
pub use query::{ChatMessage, ChatRequest, ValidatedChat};
