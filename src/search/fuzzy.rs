//! Local fuzzy matching
//!
//! Engine-independent Levenshtein utilities. Used by the result shaper when
//! the engine returns no highlight, and as a general in-memory fuzzy filter
//! over arbitrary JSON object collections.

use serde::Serialize;
use serde_json::Value;

use super::source::value_as_text;

/// Items scoring at or below this similarity are dropped
pub const SIMILARITY_THRESHOLD: f64 = 0.4;

/// Similarity reported when one string contains the other
const CONTAINMENT_SIMILARITY: f64 = 0.8;

/// An item that passed the fuzzy filter, with its best field similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub item: Value,
    pub score: f64,
}

/// Character-level edit distance (insert, delete, substitute)
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rolling rows instead of the full matrix
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Similarity in [0, 1] between two strings, case-insensitive
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 1.0;
    }

    if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
        return CONTAINMENT_SIMILARITY;
    }

    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }

    let distance = levenshtein(&a, &b) as f64;
    (1.0 - distance / longest as f64).clamp(0.0, 1.0)
}

/// Filter `items` down to those with a field similar to `term`.
///
/// Each item scores the maximum similarity over `fields`; fields may be
/// dotted paths into nested objects. Items scoring strictly above
/// [`SIMILARITY_THRESHOLD`] are returned, best first. Ties keep input order.
pub fn fuzzy_search(items: &[Value], term: &str, fields: &[String]) -> Vec<ScoredItem> {
    let term = term.trim();
    if term.is_empty() || fields.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<ScoredItem> = items
        .iter()
        .filter_map(|item| {
            let score = fields
                .iter()
                .filter_map(|field| field_text(item, field))
                .map(|text| similarity(term, &text))
                .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))?;

            (score > SIMILARITY_THRESHOLD).then(|| ScoredItem {
                item: item.clone(),
                score,
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// Look up a (possibly dotted) field and render it as text
fn field_text(item: &Value, field: &str) -> Option<String> {
    let mut current = item;
    for segment in field.split('.') {
        current = current.as_object()?.get(segment)?;
    }

    match current {
        Value::Bool(b) => Some(b.to_string()),
        other => value_as_text(other),
    }
}
