//! Source field extraction
//!
//! Indexed documents were written under several schema generations, so a
//! logical field may live under more than one key. Each logical field is
//! resolved through a fixed, ordered list of candidate keys; the first
//! non-empty value wins.

use serde_json::{Map, Value};

/// Logical document fields the result shaper reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    Content,
    FileName,
    FilePath,
    FileType,
    Timestamp,
}

impl SourceField {
    /// Candidate `_source` keys, highest priority first
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            SourceField::Content => &["content", "text", "body", "message", "data"],
            SourceField::FileName => &["fileName", "file_name", "filename"],
            SourceField::FilePath => &["filePath", "file_path", "path"],
            SourceField::FileType => &["fileType", "file_type", "extension"],
            SourceField::Timestamp => &["timestamp", "@timestamp", "createdAt", "created_at"],
        }
    }

    /// Resolve this field from a document source
    pub fn extract(self, source: &Map<String, Value>) -> Option<String> {
        self.candidates()
            .iter()
            .filter_map(|key| source.get(*key))
            .filter_map(value_as_text)
            .find(|text| !text.trim().is_empty())
    }

    /// The candidate key that produced the value, if any
    pub fn resolved_key(self, source: &Map<String, Value>) -> Option<&'static str> {
        self.candidates().iter().copied().find(|key| {
            source
                .get(*key)
                .and_then(value_as_text)
                .is_some_and(|text| !text.trim().is_empty())
        })
    }
}

/// Strings as-is, numbers stringified, anything else ignored
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_content_priority_order() {
        let doc = source(json!({ "text": "from text", "content": "from content" }));
        assert_eq!(SourceField::Content.extract(&doc).as_deref(), Some("from content"));
        assert_eq!(SourceField::Content.resolved_key(&doc), Some("content"));
    }

    #[test]
    fn test_empty_candidate_falls_through() {
        let doc = source(json!({ "content": "   ", "body": "leaked creds" }));
        assert_eq!(SourceField::Content.extract(&doc).as_deref(), Some("leaked creds"));
        assert_eq!(SourceField::Content.resolved_key(&doc), Some("body"));
    }

    #[test]
    fn test_non_text_values_ignored() {
        let doc = source(json!({ "content": { "nested": true }, "message": "hello" }));
        assert_eq!(SourceField::Content.extract(&doc).as_deref(), Some("hello"));
    }

    #[test]
    fn test_numeric_timestamp_stringified() {
        let doc = source(json!({ "@timestamp": 1700000000 }));
        assert_eq!(
            SourceField::Timestamp.extract(&doc).as_deref(),
            Some("1700000000")
        );
    }

    #[test]
    fn test_missing_field() {
        let doc = source(json!({ "content": "x" }));
        assert_eq!(SourceField::FileName.extract(&doc), None);
        assert_eq!(SourceField::FileName.resolved_key(&doc), None);
    }

    #[test]
    fn test_legacy_file_keys() {
        let doc = source(json!({
            "file_name": "dump.txt",
            "path": "/srv/dumps/dump.txt",
            "extension": "txt",
        }));
        assert_eq!(SourceField::FileName.extract(&doc).as_deref(), Some("dump.txt"));
        assert_eq!(
            SourceField::FilePath.extract(&doc).as_deref(),
            Some("/srv/dumps/dump.txt")
        );
        assert_eq!(SourceField::FileType.extract(&doc).as_deref(), Some("txt"));
    }
}
