//! Query Builder
//!
//! Turns a normalized query into an Elasticsearch `_search` request body.
//! Four boosted strategies are OR-ed together in a single `bool.should`:
//! exact phrase, literal multi-field match, fuzzy multi-field match and
//! substring wildcard on identifier fields.

use super::normalizer::NormalizedQuery;
use super::source::SourceField;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

/// Hits requested from the engine per query
pub const MAX_HITS: usize = 100;
/// Highlight fragments per hit
pub const HIGHLIGHT_FRAGMENTS: usize = 3;
/// Highlight fragment length in characters
pub const HIGHLIGHT_FRAGMENT_SIZE: usize = 150;
/// Sentinel markers wrapped around highlighted terms
pub const HIGHLIGHT_PRE_TAG: &str = "<mark>";
pub const HIGHLIGHT_POST_TAG: &str = "</mark>";

/// Boost applied to each `should` clause
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryBoosts {
    /// Exact phrase on the content field
    pub phrase: f64,
    /// Literal match across all text fields
    pub multi_match: f64,
    /// Edit-distance tolerant match across all text fields
    pub fuzzy: f64,
    /// Substring match on identifier fields
    pub wildcard: f64,
}

impl Default for QueryBoosts {
    fn default() -> Self {
        Self {
            phrase: 3.0,
            multi_match: 2.0,
            fuzzy: 1.0,
            wildcard: 4.0,
        }
    }
}

/// Which fields the query targets and how clauses are weighted
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryProfile {
    /// Primary content field (phrase match and highlighting)
    pub content_field: String,
    /// All indexed text fields
    pub text_fields: Vec<String>,
    /// Identifier-like fields searched by substring (link, url, ...)
    pub identifier_fields: Vec<String>,
    /// Field used as the secondary (recency) sort key
    pub timestamp_field: String,
    pub boosts: QueryBoosts,
}

/// Free-text fields that have no logical `SourceField` of their own
const EXTRA_TEXT_FIELDS: &[&str] = &["title", "description", "source"];

impl Default for QueryProfile {
    fn default() -> Self {
        // Every key the shaper can read a document from must also be searched
        let text_fields = [SourceField::Content, SourceField::FileName, SourceField::FilePath]
            .into_iter()
            .flat_map(SourceField::candidates)
            .chain(EXTRA_TEXT_FIELDS)
            .map(|field| field.to_string())
            .collect();

        Self {
            content_field: "content".to_string(),
            text_fields,
            identifier_fields: vec!["link".to_string()],
            timestamp_field: "timestamp".to_string(),
            boosts: QueryBoosts::default(),
        }
    }
}

impl QueryProfile {
    /// Load a profile from a JSON file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query profile {}", path.display()))?;

        let profile: QueryProfile =
            serde_json::from_str(&data).context("Failed to parse query profile")?;

        if profile.content_field.trim().is_empty() {
            anyhow::bail!("Query profile content_field cannot be empty");
        }
        if profile.text_fields.is_empty() {
            anyhow::bail!("Query profile needs at least one text field");
        }

        Ok(profile)
    }
}

/// Builds `_search` request bodies for a fixed profile
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    profile: QueryProfile,
}

impl QueryBuilder {
    pub fn new(profile: QueryProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &QueryProfile {
        &self.profile
    }

    /// Build the complete request body for a query
    pub fn build(&self, query: &NormalizedQuery) -> Value {
        json!({
            "size": MAX_HITS,
            "track_total_hits": true,
            "query": {
                "bool": {
                    "should": self.should_clauses(query),
                    "minimum_should_match": 1,
                }
            },
            "sort": [
                { "_score": { "order": "desc" } },
                {
                    self.profile.timestamp_field.as_str(): {
                        "order": "desc",
                        "unmapped_type": "date",
                    }
                },
            ],
            "highlight": {
                "pre_tags": [HIGHLIGHT_PRE_TAG],
                "post_tags": [HIGHLIGHT_POST_TAG],
                "fields": {
                    self.profile.content_field.as_str(): {
                        "number_of_fragments": HIGHLIGHT_FRAGMENTS,
                        "fragment_size": HIGHLIGHT_FRAGMENT_SIZE,
                    }
                }
            }
        })
    }

    /// The OR-ed match strategies, most specific first
    pub fn should_clauses(&self, query: &NormalizedQuery) -> Vec<Value> {
        let term = query.term.as_str();
        let boosts = &self.profile.boosts;
        let mut clauses = Vec::with_capacity(3 + self.profile.identifier_fields.len());

        clauses.push(json!({
            "match_phrase": {
                self.profile.content_field.as_str(): {
                    "query": term,
                    "boost": boosts.phrase,
                }
            }
        }));

        clauses.push(json!({
            "multi_match": {
                "query": term,
                "fields": self.profile.text_fields,
                "type": "best_fields",
                "operator": "and",
                "boost": boosts.multi_match,
            }
        }));

        // Digit strings fuzz into unrelated numbers
        if !query.phone_like {
            clauses.push(json!({
                "multi_match": {
                    "query": term,
                    "fields": self.profile.text_fields,
                    "fuzziness": "AUTO",
                    "prefix_length": 2,
                    "boost": boosts.fuzzy,
                }
            }));
        }

        let pattern = format!("*{}*", escape_wildcard(term));
        for field in &self.profile.identifier_fields {
            clauses.push(json!({
                "wildcard": {
                    field.as_str(): {
                        "value": pattern,
                        "case_insensitive": true,
                        "boost": boosts.wildcard,
                    }
                }
            }));
        }

        clauses
    }
}

/// Request path for a set of indices: `/<a,b,c>/_search`
pub fn search_path(indices: &[String]) -> String {
    format!("/{}/_search", indices.join(","))
}

/// Escape wildcard metacharacters so the term matches literally
fn escape_wildcard(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
