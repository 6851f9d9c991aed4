//! Inbound chat request types

use serde::{Deserialize, Serialize};

use super::conversation::{ConversationHistory, Role, Turn};
use crate::error::{Error, Result};

/// Longest question accepted at the boundary
pub const MAX_QUESTION_CHARS: usize = 4000;

/// A history entry as it arrives on the wire (role is free text)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat request body: `{question, chat_history}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The question to answer
    #[serde(default)]
    pub question: String,

    /// Prior turns, oldest first
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

/// A request that passed boundary validation
#[derive(Debug, Clone)]
pub struct ValidatedChat {
    pub question: String,
    pub history: ConversationHistory,
}

impl ChatRequest {
    /// Create a request without history
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            chat_history: Vec::new(),
        }
    }

    /// Append a history entry
    pub fn with_turn(mut self, role: &str, content: impl Into<String>) -> Self {
        self.chat_history.push(ChatMessage {
            role: role.to_string(),
            content: content.into(),
        });
        self
    }

    /// Reject malformed input before it enters the pipeline
    pub fn validate(self) -> Result<ValidatedChat> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(Error::invalid_request("question must not be empty"));
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(Error::invalid_request(format!(
                "question exceeds {} characters",
                MAX_QUESTION_CHARS
            )));
        }

        let mut history = ConversationHistory::new();
        for (i, message) in self.chat_history.into_iter().enumerate() {
            let role: Role = message.role.parse().map_err(|_| {
                Error::invalid_request(format!(
                    "chat_history[{}]: unknown role '{}'",
                    i, message.role
                ))
            })?;
            history.push(Turn {
                role,
                content: message.content,
            });
        }

        Ok(ValidatedChat { question, history })
    }
}
