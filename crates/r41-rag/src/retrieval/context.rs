//! Fan-in of per-query results into one prompt context

use std::collections::HashSet;

use crate::types::{Document, RetrievalResult};

/// Flatten results in order, keeping the first occurrence of each content
pub fn dedupe(results: &[RetrievalResult]) -> Vec<Document> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut documents = Vec::new();

    for scored in results.iter().flatten() {
        if seen.insert(scored.document.content.as_str()) {
            documents.push(scored.document.clone());
        }
    }

    documents
}

/// Passage contents separated by blank lines; empty input gives `""`
pub fn format_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoredDocument;

    fn scored(content: &str, source: &str) -> ScoredDocument {
        ScoredDocument::new(Document::new(content, source), 1.0)
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let results = vec![
            vec![scored("A", "first.md"), scored("B", "first.md")],
            vec![scored("B", "second.md"), scored("C", "second.md")],
        ];
        let docs = dedupe(&results);
        let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B", "C"]);
        assert_eq!(docs[1].source_id, "first.md");
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(dedupe(&[]).is_empty());
        assert!(dedupe(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_format_context() {
        let docs = vec![Document::new("A", "x"), Document::new("B", "y")];
        assert_eq!(format_context(&docs), "A\n\nB");
        assert_eq!(format_context(&[]), "");
    }
}
