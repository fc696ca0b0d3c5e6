//! Text canonicalization and lexical similarity.
//!
//! [`normalize`] produces the canonical key used for exact-duplicate
//! lookup; [`tokenize`] feeds the Jaccard scorer. All three functions are
//! pure and total — they never fail on any input string.

use std::collections::HashSet;

/// Canonicalize question text into its exact-match key.
///
/// Lowercases, maps every character that is not alphanumeric, an
/// underscore, or whitespace to a space, collapses whitespace runs to a
/// single space, and trims. Idempotent: `normalize(normalize(s)) ==
/// normalize(s)`.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for ch in lowered.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            out.push(ch);
            pending_space = false;
        } else {
            // Punctuation and whitespace both collapse into one separator.
            pending_space = true;
        }
    }
    out
}

/// Split normalized text into comparison tokens.
///
/// Tokens of length ≤ 1 are discarded; downstream scoring only uses set
/// membership, so order is irrelevant to callers.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity between two token sequences: `|A ∩ B| / |A ∪ B|`.
///
/// Returns a value in `[0.0, 1.0]`; `0.0` when the union is empty.
/// Symmetric and deterministic.
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}
