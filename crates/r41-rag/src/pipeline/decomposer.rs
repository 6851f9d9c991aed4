//! Query decomposition into sub-questions for the retrieval fan-out

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;

/// Number of query variants requested from the model
pub const QUERY_VARIANTS: usize = 4;

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]+|\(?\d+[.):]|[a-zA-Z][.)])\s+").expect("valid list marker pattern"));

/// Ordered, never-empty set of standalone questions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQuestionSet(Vec<String>);

impl SubQuestionSet {
    /// Keep the non-blank questions; falls back to `[original]` when none remain
    pub fn new(questions: Vec<String>, original: &str) -> Self {
        let questions: Vec<String> = questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if questions.is_empty() {
            Self::single(original)
        } else {
            Self(questions)
        }
    }

    pub fn single(question: &str) -> Self {
        Self(vec![question.trim().to_string()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// One question per line, list markers and quotes stripped
pub fn parse_sub_questions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| LIST_MARKER.replace(line, "").into_owned())
        .map(|line| {
            line.trim()
                .trim_matches(|c| c == '"' || c == '“' || c == '”')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .collect()
}

/// Splits a question into search queries
pub struct Decomposer {
    llm: Arc<dyn LlmProvider>,
    max_sub_questions: usize,
    include_original: bool,
    max_tokens: u32,
}

impl Decomposer {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        max_sub_questions: usize,
        include_original: bool,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm,
            max_sub_questions: max_sub_questions.max(1),
            include_original,
            max_tokens,
        }
    }

    fn variants(&self) -> usize {
        let room = self.max_sub_questions - usize::from(self.include_original);
        QUERY_VARIANTS.min(room).max(1)
    }

    /// Never empty: errors and empty output give `[question]`
    pub async fn decompose(&self, question: &str) -> SubQuestionSet {
        let question = question.trim();
        let request = PromptBuilder::decompose(question, self.variants()).with_max_tokens(self.max_tokens);

        let generated = match self.llm.generate(&request).await {
            Ok(raw) => parse_sub_questions(&raw),
            Err(e) => {
                tracing::warn!("Decomposer failed, using the question as is: {}", e);
                return SubQuestionSet::single(question);
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut questions = Vec::new();
        let candidates = self
            .include_original
            .then(|| question.to_string())
            .into_iter()
            .chain(generated);

        for candidate in candidates {
            if questions.len() == self.max_sub_questions {
                break;
            }
            if seen.insert(candidate.to_lowercase()) {
                questions.push(candidate);
            }
        }

        let set = SubQuestionSet::new(questions, question);
        tracing::debug!("Decomposed into {} sub-questions", set.len());
        set
    }
}
