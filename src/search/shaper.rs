//! Result Shaper
//!
//! Converts raw engine hits into [`SearchResult`] records: resolves the
//! content through the source field policy, collects highlight fragments,
//! explains the match with a list of matched terms and builds a context
//! snippet. Hits that cannot explain their match are discarded.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::engine::RawHit;
use super::fuzzy::levenshtein;
use super::normalizer::NormalizedQuery;
use super::query::{HIGHLIGHT_POST_TAG, HIGHLIGHT_PRE_TAG};
use super::source::SourceField;

/// Context length (in characters) when no highlight is available
pub const CONTEXT_CHARS: usize = 400;
/// Separator between highlight fragments in the context
pub const FRAGMENT_SEPARATOR: &str = " ... ";
/// Highlighted terms must be longer than this
const MIN_HIGHLIGHT_TERM_CHARS: usize = 2;
/// Fallback tokens must be longer than this to be edit-distance matched
const MIN_FUZZY_TOKEN_CHARS: usize = 3;
/// Maximum edit distance for a fallback token match
const MAX_TOKEN_DISTANCE: usize = 2;

/// A shaped, client-facing search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub score: f64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub highlights: Vec<String>,
    pub matched_terms: Vec<String>,
    pub context: String,
    pub index: String,
}

/// Shapes raw hits for a single query
pub struct ResultShaper<'a> {
    query: &'a NormalizedQuery,
    content_field: &'a str,
}

impl<'a> ResultShaper<'a> {
    /// `content_field` is the highlighted field; its fragments are listed first
    pub fn new(query: &'a NormalizedQuery, content_field: &'a str) -> Self {
        Self {
            query,
            content_field,
        }
    }

    /// Shape every hit, drop the noise and order by score, best first
    pub fn shape(&self, hits: &[RawHit]) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> =
            hits.iter().filter_map(|hit| self.shape_hit(hit)).collect();

        // Mixed index types do not always honor the requested sort
        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            "Shaped {} of {} hits for query {:?}",
            results.len(),
            hits.len(),
            self.query.term
        );

        results
    }

    /// Shape a single hit; `None` when it has no content or no explainable match
    pub fn shape_hit(&self, hit: &RawHit) -> Option<SearchResult> {
        let content = SourceField::Content.extract(&hit.source)?;
        debug!(
            "Hit {} content resolved from {:?}",
            hit.id,
            SourceField::Content.resolved_key(&hit.source)
        );

        let highlights = self.collect_highlights(hit);

        let mut matched_terms = terms_from_highlights(&highlights);
        if matched_terms.is_empty() {
            matched_terms = terms_from_content(&content, &self.query.term);
        }
        if matched_terms.is_empty() {
            debug!("Dropping hit {}: no matched terms", hit.id);
            return None;
        }

        let context = build_context(&highlights, &content);
        if context.trim().is_empty() {
            return None;
        }

        Some(SearchResult {
            id: hit.id.clone(),
            score: hit.score.unwrap_or(0.0),
            file_name: SourceField::FileName.extract(&hit.source),
            file_path: SourceField::FilePath.extract(&hit.source),
            file_type: SourceField::FileType.extract(&hit.source),
            timestamp: SourceField::Timestamp.extract(&hit.source),
            content,
            highlights,
            matched_terms,
            context,
            index: hit.index.clone(),
        })
    }

    /// Primary content field fragments first, then other fields by name
    fn collect_highlights(&self, hit: &RawHit) -> Vec<String> {
        let Some(highlight) = &hit.highlight else {
            return Vec::new();
        };

        let mut fields: Vec<&String> = highlight.keys().collect();
        fields.sort_by(|a, b| {
            (a.as_str() != self.content_field, a.as_str())
                .cmp(&(b.as_str() != self.content_field, b.as_str()))
        });

        fields
            .into_iter()
            .flat_map(|field| highlight[field].iter())
            .filter(|fragment| !fragment.trim().is_empty())
            .cloned()
            .collect()
    }
}

fn highlight_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            "{}(.*?){}",
            regex::escape(HIGHLIGHT_PRE_TAG),
            regex::escape(HIGHLIGHT_POST_TAG)
        );
        Regex::new(&pattern).expect("highlight pattern is valid")
    })
}

/// Terms wrapped in highlight markers, longer than two characters, deduplicated
pub fn terms_from_highlights(highlights: &[String]) -> Vec<String> {
    let terms = highlights.iter().flat_map(|fragment| {
        highlight_regex()
            .captures_iter(fragment)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    });

    dedup(terms.filter(|term| term.chars().count() > MIN_HIGHLIGHT_TERM_CHARS))
}

/// Local explanation of a match when the engine sent no usable highlight.
///
/// The whole term counts when the content contains it literally. Each
/// comma/whitespace token counts when it contains the term or the term
/// contains it, or when it is longer than three characters and within
/// edit distance two of the term. Comparisons are case-insensitive.
pub fn terms_from_content(content: &str, term: &str) -> Vec<String> {
    let term_lower = term.trim().to_lowercase();
    if term_lower.is_empty() {
        return Vec::new();
    }

    let mut terms = Vec::new();
    if content.to_lowercase().contains(&term_lower) {
        terms.push(term.trim().to_string());
    }

    let tokens = content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter(|token| {
            let token_lower = token.to_lowercase();
            token_lower.contains(&term_lower)
                || term_lower.contains(&token_lower)
                || (token.chars().count() > MIN_FUZZY_TOKEN_CHARS
                    && levenshtein(&token_lower, &term_lower) <= MAX_TOKEN_DISTANCE)
        })
        .map(str::to_string);
    terms.extend(tokens);

    dedup(terms.into_iter())
}

/// Highlight fragments joined without markers, or the head of the content
pub fn build_context(highlights: &[String], content: &str) -> String {
    if !highlights.is_empty() {
        return highlights
            .iter()
            .map(|fragment| strip_markers(fragment))
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR);
    }

    truncate(content, CONTEXT_CHARS)
}

/// Remove highlight markers from a fragment
pub fn strip_markers(fragment: &str) -> String {
    fragment
        .replace(HIGHLIGHT_PRE_TAG, "")
        .replace(HIGHLIGHT_POST_TAG, "")
}

/// First `max_chars` characters, with `...` appended when cut.
/// Cuts on grapheme boundaries so combining marks stay attached.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let len = grapheme.chars().count();
        if used + len > max_chars {
            break;
        }
        out.push_str(grapheme);
        used += len;
    }
    out.push_str("...");
    out
}

/// Keep the first occurrence of each term
fn dedup(terms: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms.filter(|term| seen.insert(term.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, score: f64, source: serde_json::Value) -> RawHit {
        serde_json::from_value(json!({
            "_id": id,
            "_score": score,
            "_index": "leaks",
            "_source": source,
        }))
        .unwrap()
    }

    fn hit_with_highlight(id: &str, score: f64, content: &str, fragments: &[&str]) -> RawHit {
        serde_json::from_value(json!({
            "_id": id,
            "_score": score,
            "_index": "leaks",
            "_source": { "content": content },
            "highlight": { "content": fragments },
        }))
        .unwrap()
    }

    fn query(raw: &str) -> NormalizedQuery {
        NormalizedQuery::parse(raw).unwrap()
    }

    #[test]
    fn test_terms_from_highlights() {
        let fragments = vec![
            "user <mark>admin</mark> logged in as <mark>admin</mark>".to_string(),
            "<mark>to</mark> the <mark>Server</mark>".to_string(),
        ];
        assert_eq!(terms_from_highlights(&fragments), vec!["admin", "Server"]);
    }

    #[test]
    fn test_terms_from_content_substring_both_ways() {
        let terms = terms_from_content("leak: passwords, pass, other", "password");
        // "passwords" contains the term, "pass" is contained by it
        assert_eq!(terms, vec!["password", "passwords", "pass"]);
    }

    #[test]
    fn test_terms_from_content_edit_distance() {
        let terms = terms_from_content("found pasword and pwd here", "password");
        assert_eq!(terms, vec!["pasword"]);
    }

    #[test]
    fn test_terms_from_content_short_tokens_need_containment() {
        // "cat" vs "car": distance 1 but too short to count
        assert!(terms_from_content("cat", "car").is_empty());
    }

    #[test]
    fn test_terms_from_content_distance_boundary() {
        assert_eq!(levenshtein("bexcan", "beacon"), 2);
        assert_eq!(levenshtein("bqxcan", "beacon"), 3);
        assert_eq!(terms_from_content("seen bexcan", "beacon"), vec!["bexcan"]);
        assert!(terms_from_content("seen bqxcan", "beacon").is_empty());
    }

    #[test]
    fn test_terms_from_content_four_char_token_is_eligible() {
        assert_eq!(terms_from_content("puss", "pass"), vec!["puss"]);
    }

    #[test]
    fn test_terms_from_content_whole_phrase() {
        let terms = terms_from_content("Contact John Smith today", "john smith");
        assert_eq!(terms[0], "john smith");
        assert!(terms.contains(&"John".to_string()));
        assert!(terms.contains(&"Smith".to_string()));
    }

    #[test]
    fn test_build_context_from_highlights() {
        let fragments = vec![
            "first <mark>hit</mark>".to_string(),
            "second <mark>hit</mark>".to_string(),
        ];
        assert_eq!(build_context(&fragments, "ignored"), "first hit ... second hit");
    }

    #[test]
    fn test_build_context_truncates_content() {
        let content = "x".repeat(450);
        let context = build_context(&[], &content);
        assert_eq!(context.chars().count(), CONTEXT_CHARS + 3);
        assert!(context.ends_with("..."));

        let short = build_context(&[], "short text");
        assert_eq!(short, "short text");
    }

    #[test]
    fn test_shape_uses_highlights() {
        let q = query("beacon");
        let hits = vec![hit_with_highlight(
            "1",
            4.2,
            "cobalt strike beacon config",
            &["cobalt strike <mark>beacon</mark> config"],
        )];
        let results = ResultShaper::new(&q, "content").shape(&hits);

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.matched_terms, vec!["beacon"]);
        assert_eq!(r.context, "cobalt strike beacon config");
        assert_eq!(r.highlights.len(), 1);
        assert_eq!(r.index, "leaks");
        assert_eq!(r.score, 4.2);
    }

    #[test]
    fn test_shape_falls_back_when_highlights_do_not_qualify() {
        let q = query("ab");
        let hits = vec![hit_with_highlight("1", 1.0, "ab cd", &["<mark>ab</mark> cd"])];
        let results = ResultShaper::new(&q, "content").shape(&hits);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched_terms, vec!["ab"]);
        // Context still comes from the highlight
        assert_eq!(results[0].context, "ab cd");
    }

    #[test]
    fn test_shape_drops_unexplained_hits() {
        let q = query("ransomware");
        let hits = vec![
            hit("keep", 2.0, json!({ "content": "new ransomware strain" })),
            hit("drop", 3.0, json!({ "content": "quarterly sales report" })),
        ];
        let results = ResultShaper::new(&q, "content").shape(&hits);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "keep");
    }

    #[test]
    fn test_shape_drops_blank_content() {
        let q = query("anything");
        let hits = vec![
            hit("blank", 5.0, json!({ "content": "   " })),
            hit("missing", 5.0, json!({ "fileName": "anything.txt" })),
        ];
        assert!(ResultShaper::new(&q, "content").shape(&hits).is_empty());
    }

    #[test]
    fn test_shape_resorts_by_score() {
        let q = query("token");
        let hits = vec![
            hit("low", 0.5, json!({ "content": "token a" })),
            hit("high", 9.0, json!({ "content": "token b" })),
            hit("mid", 3.0, json!({ "content": "token c" })),
        ];
        let ids: Vec<String> = ResultShaper::new(&q, "content")
            .shape(&hits)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_shape_resolves_legacy_fields() {
        let q = query("invoice");
        let hits = vec![hit(
            "1",
            1.0,
            json!({
                "text": "fake invoice attached",
                "file_name": "invoice.pdf",
                "path": "/mail/invoice.pdf",
                "fileType": "pdf",
                "@timestamp": "2024-03-01T10:00:00Z",
            }),
        )];
        let r = &ResultShaper::new(&q, "content").shape(&hits)[0];
        assert_eq!(r.content, "fake invoice attached");
        assert_eq!(r.file_name.as_deref(), Some("invoice.pdf"));
        assert_eq!(r.file_path.as_deref(), Some("/mail/invoice.pdf"));
        assert_eq!(r.file_type.as_deref(), Some("pdf"));
        assert_eq!(r.timestamp.as_deref(), Some("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn test_search_result_serializes_camel_case() {
        let q = query("token");
        let hits = vec![hit("1", 1.0, json!({ "content": "token", "fileName": "a.txt" }))];
        let r = &ResultShaper::new(&q, "content").shape(&hits)[0];
        let value = serde_json::to_value(r).unwrap();
        assert!(value.get("matchedTerms").is_some());
        assert_eq!(value["fileName"], "a.txt");
        assert!(value.get("filePath").is_none());
    }

    #[test]
    fn test_phone_query_matches_digits_in_content() {
        let q = query("(555) 123-4567");
        let hits = vec![hit("1", 1.0, json!({ "content": "call 5551234567 now" }))];
        let results = ResultShaper::new(&q, "content").shape(&hits);
        assert_eq!(results[0].matched_terms, vec!["5551234567"]);
    }
}
