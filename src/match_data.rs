//! Match metadata returned with search results.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::index::posting::TermMetadata;

/// Metadata about the terms that matched a document, organised as
/// term → field → metadata key → accumulated values.
///
/// Metadata is copied out of postings on construction so that results
/// never alias the index's internal state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchData {
    metadata: BTreeMap<String, BTreeMap<String, TermMetadata>>,
}

impl MatchData {
    /// An empty match.
    pub fn new() -> Self {
        MatchData::default()
    }

    /// A match seeded with one term's metadata in one field.
    pub fn with(term: &str, field: &str, metadata: &TermMetadata) -> Self {
        let mut match_data = MatchData::new();
        match_data.add(term, field, metadata);
        match_data
    }

    /// Record `metadata` for `term` in `field`, concatenating value lists
    /// per metadata key.
    pub fn add(&mut self, term: &str, field: &str, metadata: &TermMetadata) {
        let fields = self.metadata.entry(term.to_string()).or_default();
        let keys = fields.entry(field.to_string()).or_default();
        for (key, values) in metadata {
            keys.entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Deep-merge another match into this one, concatenating value lists.
    pub fn combine(&mut self, other: &MatchData) {
        for (term, fields) in &other.metadata {
            for (field, keys) in fields {
                self.add(term, field, keys);
            }
        }
    }

    /// The matched terms.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.metadata.keys().map(String::as_str)
    }

    /// The full term → field → key → values structure.
    pub fn metadata(&self) -> &BTreeMap<String, BTreeMap<String, TermMetadata>> {
        &self.metadata
    }

    /// The accumulated values for one (term, field, key) triple.
    pub fn values(&self, term: &str, field: &str, key: &str) -> Option<&Vec<Value>> {
        self.metadata.get(term)?.get(field)?.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn positions(values: &[Value]) -> TermMetadata {
        let mut metadata = TermMetadata::new();
        metadata.insert("position".to_string(), values.to_vec());
        metadata
    }

    #[test]
    fn test_add_concatenates_value_lists() {
        let mut match_data = MatchData::with("foo", "title", &positions(&[json!([1, 3])]));
        match_data.add("foo", "title", &positions(&[json!([7, 3])]));
        assert_eq!(
            match_data.values("foo", "title", "position").unwrap(),
            &vec![json!([1, 3]), json!([7, 3])]
        );
    }

    #[test]
    fn test_add_keeps_fields_separate() {
        let mut match_data = MatchData::with("foo", "title", &positions(&[json!([1, 3])]));
        match_data.add("foo", "body", &positions(&[json!([5, 3])]));
        assert_eq!(
            match_data.values("foo", "title", "position").unwrap(),
            &vec![json!([1, 3])]
        );
        assert_eq!(
            match_data.values("foo", "body", "position").unwrap(),
            &vec![json!([5, 3])]
        );
    }

    #[test]
    fn test_combine_deep_merges() {
        let mut left = MatchData::with("foo", "title", &positions(&[json!([1, 3])]));
        let mut right = MatchData::with("foo", "title", &positions(&[json!([9, 3])]));
        right.add("bar", "body", &positions(&[json!([2, 3])]));

        left.combine(&right);

        assert_eq!(left.terms().collect::<Vec<_>>(), vec!["bar", "foo"]);
        assert_eq!(
            left.values("foo", "title", "position").unwrap(),
            &vec![json!([1, 3]), json!([9, 3])]
        );
        assert_eq!(
            left.values("bar", "body", "position").unwrap(),
            &vec![json!([2, 3])]
        );
    }

    #[test]
    fn test_construction_copies_metadata() {
        let mut source = positions(&[json!([1, 3])]);
        let match_data = MatchData::with("foo", "title", &source);
        source.get_mut("position").unwrap().push(json!([9, 9]));
        assert_eq!(
            match_data.values("foo", "title", "position").unwrap(),
            &vec![json!([1, 3])]
        );
    }
}
