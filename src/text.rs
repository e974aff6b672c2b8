//! Text normalization and tokenization shared by the vectorizer and the
//! hybrid search signals. Both sides must tokenize identically or query
//! tokens stop lining up with article tokens.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Alphabetic runs of two or more characters. Shorter runs are noise.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]{2,}").unwrap());

/// Small embedded stopword list applied by both tokenization paths.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "with", "and", "or", "but", "to",
    "of", "in", "on", "at", "for", "by", "from", "as", "it", "this", "that",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Lower-case and map hyphens to spaces, so "tf-idf" matches "tf idf".
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace('-', " ")
}

/// Tokenize into lowercase alphabetic terms, stopwords removed.
/// Preserves order and duplicates (term frequency matters to TF-IDF).
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(&normalize(text))
        .map(|m| m.as_str().to_string())
        .filter(|t| !STOPWORD_SET.contains(t.as_str()))
        .collect()
}

/// Unique tokens of a text. Used by the token-overlap search signal.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// `|tokens(query) ∩ tokens(text)| / |tokens(query)|`.
/// 0.0 when either side tokenizes to nothing.
pub fn token_overlap(query: &str, text: &str) -> f64 {
    let q_tokens = token_set(query);
    let t_tokens = token_set(text);

    if q_tokens.is_empty() || t_tokens.is_empty() {
        return 0.0;
    }

    let overlap = q_tokens.intersection(&t_tokens).count();
    overlap as f64 / q_tokens.len() as f64
}
