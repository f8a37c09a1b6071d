//! Query Normalizer
//!
//! Folds the raw query text, rejects empty input and recognizes
//! phone-number-like queries so they can be searched as bare digits.

use crate::error::AppError;
use unicode_normalization::UnicodeNormalization;

/// Digit count range (inclusive) for a query to count as a phone number
pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;

/// Longest accepted query, in characters
pub const MAX_QUERY_CHARS: usize = 500;

/// A validated query ready for the query builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Trimmed query as the user typed it
    pub original: String,
    /// Effective search term sent to the engine
    pub term: String,
    /// Whether the query was recognized as a phone number
    pub phone_like: bool,
}

impl NormalizedQuery {
    /// Normalize a raw query string
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let original = normalize_text(raw);

        if original.is_empty() {
            return Err(AppError::invalid("query", "Query cannot be empty"));
        }

        if original.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::invalid(
                "query",
                "Query too long, maximum 500 characters",
            ));
        }

        let digits = strip_non_digits(&original);
        let phone_like = is_phone_digits(&digits);
        let term = if phone_like { digits } else { original.clone() };

        Ok(Self {
            original,
            term,
            phone_like,
        })
    }
}

/// Unicode NFKC folding plus trimming.
/// NFKC maps full-width digits onto ASCII digits.
pub fn normalize_text(text: &str) -> String {
    text.nfkc().collect::<String>().trim().to_string()
}

fn strip_non_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn is_phone_digits(digits: &str) -> bool {
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}
