//! Model clients, prompt templates and stream decoding

pub mod ollama;
pub mod prompt;
pub mod retry;
pub mod stream;

pub use ollama::OllamaClient;
pub use prompt::PromptBuilder;
pub use stream::{LineEvent, TokenStream};
