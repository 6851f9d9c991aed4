//! Token-set string similarity
//!
//! Scores lie in `[0, 100]`. Both inputs are normalised (lowercase, every
//! non-alphanumeric character replaced by a space), split into token sets and
//! compared on their sorted intersection and differences, so word order and
//! repeated words do not matter.

use std::collections::BTreeSet;

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(|c| c.to_lowercase())
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sorted, deduplicated tokens of an already-normalised string
pub fn token_set(normalized: &str) -> BTreeSet<&str> {
    normalized.split_whitespace().collect()
}

/// Longest common subsequence length over chars
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Insertion/deletion distance between two strings
fn indel_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    a.len() + b.len() - 2 * lcs_len(&a, &b)
}

/// `100 * (1 - dist / total)`, 100 when both sides are empty
fn normalized_similarity(dist: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    100.0 * (1.0 - dist as f64 / total as f64)
}

/// Plain normalised indel similarity of two strings
pub fn ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    normalized_similarity(indel_distance(a, b), total)
}

/// Token-set similarity between two raw strings
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    token_set_ratio_normalized(&a, &b)
}

/// Token-set similarity between two strings already passed through [`normalize`]
pub fn token_set_ratio_normalized(a: &str, b: &str) -> f64 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    // One side is a subset of the other
    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let ab = diff_ab.join(" ");
    let ba = diff_ba.join(" ");
    let sect_len = sect.chars().count();
    let ab_len = ab.chars().count();
    let ba_len = ba.chars().count();

    let mut best = normalized_similarity(indel_distance(&ab, &ba), ab_len + ba_len);
    if sect_len == 0 {
        return best;
    }

    // sect vs sect + " " + diff: the distance is just the appended part
    let sep = 1;
    let sect_ab_len = sect_len + sep + ab_len;
    let sect_ba_len = sect_len + sep + ba_len;
    best = best.max(normalized_similarity(sep + ab_len, sect_len + sect_ab_len));
    best = best.max(normalized_similarity(sep + ba_len, sect_len + sect_ba_len));
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  What is R41?!  "), "what is r41");
        assert_eq!(normalize("Qui-est   le président ?"), "qui est le président");
    }

    #[test]
    fn test_identical_and_reordered() {
        assert_eq!(token_set_ratio("What is R41?", "what is r41"), 100.0);
        assert_eq!(token_set_ratio("R41 is what", "what is R41"), 100.0);
        assert_eq!(token_set_ratio("is is R41 what", "what is R41"), 100.0);
    }

    #[test]
    fn test_subset_scores_full() {
        assert_eq!(token_set_ratio("join club", "how do I join the club"), 100.0);
    }

    #[test]
    fn test_typo_scores_high() {
        let score = token_set_ratio("how can i jion the club", "How can I join the club?");
        assert!(score >= 85.0, "score was {}", score);
    }

    #[test]
    fn test_unrelated_scores_low() {
        let score = token_set_ratio("capital of France", "How can I join the club?");
        assert!(score < 60.0, "score was {}", score);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(token_set_ratio("", "anything"), 0.0);
        assert_eq!(token_set_ratio("?!", "anything"), 0.0);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("", ""), 100.0);
        // "wat" vs "what": one insertion over 7 chars
        assert!((ratio("wat", "what") - 100.0 * (1.0 - 1.0 / 7.0)).abs() < 1e-9);
    }
}
