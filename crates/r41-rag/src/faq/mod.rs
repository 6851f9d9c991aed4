//! FAQ fast path: fuzzy matching against the canonical Q&A table
//!
//! The table is loaded once at startup and never mutated afterwards; share it
//! behind an `Arc`.

pub mod fuzzy;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Document;

/// One canonical question and its answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Representation used when the row is indexed as a knowledge document
    pub fn to_document(&self) -> Document {
        Document::new(format!("Q: {}\nA: {}", self.question, self.answer), "faq")
            .with_metadata("question", serde_json::Value::String(self.question.clone()))
    }
}

/// Best-scoring entry for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaqMatch {
    /// Position in the table
    pub index: usize,
    /// Token-set score in `[0, 100]`
    pub score: f64,
}

/// Immutable FAQ table with pre-normalised questions
#[derive(Debug, Clone, Default)]
pub struct FaqMatcher {
    entries: Vec<FaqEntry>,
    normalized: Vec<String>,
}

impl FaqMatcher {
    /// Build from entries; rows with a blank question or answer are skipped
    pub fn new(entries: Vec<FaqEntry>) -> Self {
        let entries: Vec<FaqEntry> = entries
            .into_iter()
            .map(|e| FaqEntry::new(e.question.trim(), e.answer.trim()))
            .filter(|e| !e.question.is_empty() && !e.answer.is_empty())
            .collect();
        let normalized = entries.iter().map(|e| fuzzy::normalize(&e.question)).collect();
        Self { entries, normalized }
    }

    /// Load a `question,answer` CSV file
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Faq(format!("Failed to open {}: {}", path.display(), e)))?;
        Self::from_reader(file)
    }

    /// Load `question,answer` CSV rows from any reader
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in csv_reader.deserialize::<FaqEntry>() {
            entries.push(record?);
        }

        let matcher = Self::new(entries);
        tracing::info!("Loaded {} FAQ entries", matcher.len());
        Ok(matcher)
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-scoring entry; the earliest entry wins ties
    pub fn best_match(&self, query: &str) -> Option<FaqMatch> {
        let query = fuzzy::normalize(query);
        let mut best: Option<FaqMatch> = None;

        for (index, question) in self.normalized.iter().enumerate() {
            let score = fuzzy::token_set_ratio_normalized(&query, question);
            if best.map_or(true, |b| score > b.score) {
                best = Some(FaqMatch { index, score });
            }
        }

        best
    }

    /// Answer of the best entry if its score reaches `threshold`
    pub fn find(&self, query: &str, threshold: u8) -> Option<&str> {
        let best = self.best_match(query)?;
        if best.score >= f64::from(threshold) {
            tracing::debug!(
                "FAQ hit (score {:.1}): \"{}\"",
                best.score,
                self.entries[best.index].question
            );
            Some(self.entries[best.index].answer.as_str())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> FaqMatcher {
        FaqMatcher::new(vec![
            FaqEntry::new("How can I join the club?", "Fill in the form on our Instagram."),
            FaqEntry::new("When are the meetings?", "Every Wednesday at 18:00."),
            FaqEntry::new("How do I join the club?", "Duplicate wording, second answer."),
        ])
    }

    #[test]
    fn test_exact_hit() {
        assert_eq!(
            matcher().find("When are the meetings?", 85),
            Some("Every Wednesday at 18:00.")
        );
    }

    #[test]
    fn test_typo_hit() {
        assert_eq!(
            matcher().find("how can i jion the club", 85),
            Some("Fill in the form on our Instagram.")
        );
    }

    #[test]
    fn test_below_threshold() {
        let m = matcher();
        assert!(m.find("What is the capital of France?", 85).is_none());
        let best = m.best_match("What is the capital of France?").unwrap();
        assert!(best.score < 85.0);
    }

    #[test]
    fn test_ties_prefer_first_entry() {
        // "join the club" is a subset of both join questions: both score 100
        let best = matcher().best_match("join the club").unwrap();
        assert_eq!(best.index, 0);
        assert_eq!(best.score, 100.0);
    }

    #[test]
    fn test_empty_table() {
        let m = FaqMatcher::default();
        assert!(m.best_match("anything").is_none());
        assert!(m.find("anything", 0).is_none());
    }

    #[test]
    fn test_csv_loading() {
        let csv = "question,answer\n\
                   \"What is R41?\",\"A student club at ENSAB.\"\n\
                   \"  \",\"ignored\"\n";
        let m = FaqMatcher::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.entries()[0].answer, "A student club at ENSAB.");
    }

    #[test]
    fn test_faq_document_format() {
        let doc = FaqEntry::new("What is R41?", "A club.").to_document();
        assert_eq!(doc.content, "Q: What is R41?\nA: A club.");
        assert_eq!(doc.source_id, "faq");
    }
}
