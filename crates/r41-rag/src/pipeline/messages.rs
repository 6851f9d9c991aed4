//! Fixed user-facing sentences

/// Single terminal chunk for out-of-domain questions
pub const REFUSAL_MESSAGE: &str =
    "I can only answer questions about the R41 club. How can I help you with that?";

/// Grounding fallback when the knowledge base has nothing relevant
pub const DONT_KNOW_MESSAGE: &str =
    "I don’t have this info yet. Please contact us on Instagram @r.41_ensab.";

/// Emitted once when the generator fails
pub const GENERATION_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while generating the answer. Please try again.";

/// Emitted once when the request deadline expires
pub const TIMEOUT_MESSAGE: &str =
    "Sorry, this is taking longer than expected. Please try again in a moment.";

/// Whether `answer` is the don't-know fallback, ignoring whitespace,
/// surrounding quotes and apostrophe style
pub fn is_dont_know(answer: &str) -> bool {
    fn canonical(s: &str) -> String {
        s.trim()
            .trim_matches(|c| c == '"' || c == '“' || c == '”')
            .replace('’', "'")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
    canonical(answer) == canonical(DONT_KNOW_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dont_know() {
        assert!(is_dont_know(DONT_KNOW_MESSAGE));
        assert!(is_dont_know(
            "  \"I don't have this info yet. Please contact us on Instagram @r.41_ensab.\"\n"
        ));
        assert!(!is_dont_know("The club meets on Wednesdays."));
    }
}
