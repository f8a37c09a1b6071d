//! Markdown rendering for CLI output

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::search::{ScoredItem, SearchOutcome};

/// Render a search outcome as markdown, matched terms in **bold**
pub fn format_search_outcome(outcome: &SearchOutcome) -> String {
    let mut md = String::new();
    md.push_str(&format!(
        "# Search Results · {} of {} for \"{}\"\n\n",
        outcome.results.len(),
        outcome.total,
        outcome.query
    ));
    if outcome.phone_like {
        md.push_str("_Searched as a phone number._\n\n");
    }

    for result in &outcome.results {
        let title = result
            .file_name
            .as_deref()
            .or(result.file_path.as_deref())
            .unwrap_or(&result.id);
        md.push_str(&format!("## {} ({:.2})\n\n", title, result.score));

        md.push_str(&format!(
            "> {}\n\n",
            emphasize(&result.context, &result.matched_terms)
        ));

        md.push_str(&format!("- Index: {}\n", result.index));
        if let Some(path) = &result.file_path {
            md.push_str(&format!("- Path: {}\n", path));
        }
        if let Some(file_type) = &result.file_type {
            md.push_str(&format!("- Type: {}\n", file_type));
        }
        if let Some(timestamp) = &result.timestamp {
            md.push_str(&format!("- Time: {}\n", render_timestamp(timestamp)));
        }
        md.push_str(&format!("- Matched: {}\n", result.matched_terms.join(", ")));

        md.push_str("\n---\n\n");
    }

    md
}

/// Render fuzzy matches as markdown, one compact JSON line per item
pub fn format_fuzzy_results(results: &[ScoredItem], term: &str) -> String {
    let mut md = String::new();
    md.push_str(&format!(
        "# Fuzzy Matches · {} for \"{}\"\n\n",
        results.len(),
        term
    ));
    for scored in results {
        md.push_str(&format!("- {:.2} `{}`\n", scored.score, scored.item));
    }
    md
}

/// Wrap every case-insensitive occurrence of any term in `**`
///
/// Overlapping and adjacent ranges are merged so emphasis never nests.
fn emphasize(text: &str, terms: &[String]) -> String {
    let lower = text.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; fall back to plain text
    if lower.len() != text.len() {
        return text.to_string();
    }

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for term in terms {
        let needle = term.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let mut idx = 0usize;
        while let Some(pos) = lower[idx..].find(&needle) {
            let start = idx + pos;
            let end = start + needle.len();
            if text.is_char_boundary(start) && text.is_char_boundary(end) {
                ranges.push((start, end));
            }
            idx = end;
        }
    }

    if ranges.is_empty() {
        return text.to_string();
    }

    ranges.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (s, e) in ranges {
        match merged.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }

    let mut out = String::with_capacity(text.len() + merged.len() * 4);
    let mut last_idx = 0usize;
    for (s, e) in merged {
        out.push_str(&text[last_idx..s]);
        out.push_str("**");
        out.push_str(&text[s..e]);
        out.push_str("**");
        last_idx = e;
    }
    out.push_str(&text[last_idx..]);
    out
}

/// Normalize the common timestamp shapes to RFC 3339 UTC; unknown shapes pass through
fn render_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Utc
            .from_utc_datetime(&naive)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    // Epoch millis, as stored by most log shippers
    if let Ok(millis) = trimmed.parse::<i64>() {
        if let Some(dt) = Utc.timestamp_millis_opt(millis).single() {
            return dt.to_rfc3339_opts(SecondsFormat::Secs, true);
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchResult;
    use serde_json::json;

    fn result(context: &str, terms: &[&str]) -> SearchResult {
        SearchResult {
            id: "doc-1".to_string(),
            score: 3.5,
            content: context.to_string(),
            file_name: Some("creds.txt".to_string()),
            file_path: None,
            file_type: Some("txt".to_string()),
            timestamp: Some("2024-03-01T10:15:00+02:00".to_string()),
            highlights: vec![],
            matched_terms: terms.iter().map(|t| t.to_string()).collect(),
            context: context.to_string(),
            index: "leaks".to_string(),
        }
    }

    #[test]
    fn test_format_search_outcome() {
        let outcome = SearchOutcome {
            query: "password".to_string(),
            phone_like: false,
            results: vec![result("admin Password list", &["password"])],
            total: 4,
            engine_total: 12,
        };

        let md = format_search_outcome(&outcome);
        assert!(md.contains("# Search Results · 1 of 4 for \"password\""));
        assert!(md.contains("## creds.txt (3.50)"));
        assert!(md.contains("> admin **Password** list"));
        assert!(md.contains("- Time: 2024-03-01T08:15:00Z"));
        assert!(!md.contains("phone number"));
    }

    #[test]
    fn test_format_empty_outcome() {
        let outcome = SearchOutcome {
            query: "5551234567".to_string(),
            phone_like: true,
            results: vec![],
            total: 0,
            engine_total: 0,
        };
        let md = format_search_outcome(&outcome);
        assert!(md.contains("0 of 0"));
        assert!(md.contains("phone number"));
    }

    #[test]
    fn test_emphasize_merges_overlaps() {
        let terms = vec!["pass".to_string(), "password".to_string()];
        assert_eq!(emphasize("my password", &terms), "my **password**");
        assert_eq!(emphasize("nothing", &terms), "nothing");
    }

    #[test]
    fn test_emphasize_multiple_terms() {
        let terms = vec!["alice".to_string(), "bob".to_string()];
        assert_eq!(
            emphasize("Alice met Bob", &terms),
            "**Alice** met **Bob**"
        );
    }

    #[test]
    fn test_render_timestamp() {
        assert_eq!(render_timestamp("2024-01-01T00:00:00Z"), "2024-01-01T00:00:00Z");
        assert_eq!(render_timestamp("2024-01-01 12:30:00"), "2024-01-01T12:30:00Z");
        assert_eq!(render_timestamp("1704067200000"), "2024-01-01T00:00:00Z");
        assert_eq!(render_timestamp("last tuesday"), "last tuesday");
    }

    #[test]
    fn test_format_fuzzy_results() {
        let results = vec![ScoredItem {
            item: json!({ "name": "Jon Smith" }),
            score: 0.9,
        }];
        let md = format_fuzzy_results(&results, "John Smith");
        assert!(md.contains("# Fuzzy Matches · 1 for \"John Smith\""));
        assert!(md.contains("- 0.90 `{\"name\":\"Jon Smith\"}`"));
    }
}
