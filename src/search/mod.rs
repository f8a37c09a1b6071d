//! Search relevance layer
//!
//! Query normalization, Elasticsearch query construction, result shaping
//! and the local Levenshtein fuzzy matcher.

pub mod engine;
pub mod fuzzy;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod shaper;
pub mod source;

pub use engine::EngineClient;
pub use fuzzy::{fuzzy_search, ScoredItem};
pub use normalizer::NormalizedQuery;
pub use pipeline::{run_search, SearchOutcome};
pub use query::QueryProfile;
pub use shaper::SearchResult;
