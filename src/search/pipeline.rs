//! Search pipeline
//!
//! Normalize, query the engine, shape. A search either fully succeeds
//! (possibly with zero results) or fails as a whole.

use serde::Serialize;
use tracing::info;

use super::engine::EngineClient;
use super::normalizer::NormalizedQuery;
use super::shaper::{ResultShaper, SearchResult};
use crate::error::AppError;

/// Shaped results for one query
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// The query as received (trimmed)
    pub query: String,
    /// Whether the query was searched as a phone number
    #[serde(rename = "phoneLike")]
    pub phone_like: bool,
    /// Shaped results, best first, capped at the caller's limit
    pub results: Vec<SearchResult>,
    /// Results that survived shaping, before the cap
    pub total: usize,
    /// Documents the engine reported as matching
    #[serde(rename = "engineTotal")]
    pub engine_total: u64,
}

/// Run one search end to end
pub async fn run_search(
    engine: &EngineClient,
    raw_query: &str,
    limit: usize,
) -> Result<SearchOutcome, AppError> {
    let query = NormalizedQuery::parse(raw_query)?;

    let response = engine.search(&query).await?;
    let engine_total = response.total();

    let content_field = engine.builder().profile().content_field.as_str();
    let mut results = ResultShaper::new(&query, content_field).shape(&response.hits.hits);
    let total = results.len();
    results.truncate(limit);

    info!(
        "Search {:?}: {} shaped of {} engine hits, returning {}",
        query.original,
        total,
        engine_total,
        results.len()
    );

    Ok(SearchOutcome {
        query: query.original,
        phone_like: query.phone_like,
        results,
        total,
        engine_total,
    })
}
