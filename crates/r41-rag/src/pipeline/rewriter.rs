//! Standalone, temporally grounded question rewriting

use std::sync::Arc;

use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::types::ConversationHistory;

use super::temporal::TemporalContext;

/// Rewrites a raw question using history and the current date
///
/// Never fails: any generator error or unusable output returns the original
/// question.
pub struct QueryRewriter {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
    start_month: u32,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>, max_tokens: u32, start_month: u32) -> Self {
        Self {
            llm,
            max_tokens,
            start_month,
        }
    }

    pub async fn rewrite(&self, question: &str, history: &ConversationHistory) -> String {
        let temporal = TemporalContext::now(self.start_month);
        self.rewrite_with(question, history, &temporal).await
    }

    /// Rewrite against an explicit calendar context
    pub async fn rewrite_with(
        &self,
        question: &str,
        history: &ConversationHistory,
        temporal: &TemporalContext,
    ) -> String {
        let request = PromptBuilder::rewrite(question, history, temporal).with_max_tokens(self.max_tokens);

        match self.llm.generate(&request).await {
            Ok(raw) => match clean_rewrite(&raw) {
                Some(rewritten) => {
                    tracing::debug!("Rewrote {:?} -> {:?}", question, rewritten);
                    rewritten
                }
                None => {
                    tracing::warn!("Rewriter returned nothing usable; keeping the original question");
                    question.to_string()
                }
            },
            Err(e) => {
                tracing::warn!("Rewriter failed, keeping the original question: {}", e);
                question.to_string()
            }
        }
    }
}

/// First non-empty line, without a label or surrounding quotes
fn clean_rewrite(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = ["Rewritten question:", "Question:", "Query:"]
        .iter()
        .find_map(|label| line.strip_prefix(label))
        .unwrap_or(line)
        .trim();
    let line = line
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”' || c == '`')
        .trim();
    (!line.is_empty()).then(|| line.to_string())
}
