//! Lexical word-set similarity for task deduplication.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "for", "from", "i", "in", "into",
    "is", "it", "its", "me", "my", "of", "on", "or", "our", "so", "that", "the", "their", "then",
    "this", "to", "up", "was", "we", "with", "you", "your",
];

/// Lowercased content words of `text`, with possessive `'s` dropped.
pub fn normalize_words(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .map(|w| w.strip_suffix("'s").unwrap_or(w))
        .map(|w| w.replace('\'', ""))
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Intersection over union; 0.0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&normalize_words(a), &normalize_words(b))
}

/// True when the word-set similarity is strictly above `threshold`.
pub fn is_near_duplicate(a: &str, b: &str, threshold: f64) -> bool {
    text_similarity(a, b) > threshold
}
