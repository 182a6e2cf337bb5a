//! Postings and field references.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LunariaError, Result};

/// Metadata recorded for a term's occurrences: metadata key to the list
/// of values accumulated across occurrences.
pub type TermMetadata = BTreeMap<String, Vec<Value>>;

/// Per-field postings for a term: document reference to occurrence
/// metadata.
pub type FieldPostings = BTreeMap<String, TermMetadata>;

/// The inverted-index record for a term.
///
/// `term_index` is the term's coordinate in the shared vector space;
/// `fields` maps every registered field name to the documents containing
/// the term in that field, with any whitelisted metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    #[serde(rename = "_index")]
    pub term_index: u32,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldPostings>,
}

/// The pair of a document reference and a field name, identifying one
/// per-document field.
///
/// Serialises as `fieldName/documentRef`. Field names must not contain
/// `/` (enforced at field registration); document references may, so
/// parsing splits at the first `/` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    doc_ref: String,
    field_name: String,
}

impl FieldRef {
    pub fn new<D: Into<String>, F: Into<String>>(doc_ref: D, field_name: F) -> Self {
        FieldRef {
            doc_ref: doc_ref.into(),
            field_name: field_name.into(),
        }
    }

    pub fn doc_ref(&self) -> &str {
        &self.doc_ref
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.field_name, self.doc_ref)
    }
}

impl FromStr for FieldRef {
    type Err = LunariaError;

    fn from_str(s: &str) -> Result<Self> {
        let (field_name, doc_ref) = s.split_once('/').ok_or_else(|| {
            LunariaError::config(format!("malformed field ref string: {s:?}"))
        })?;
        Ok(FieldRef::new(doc_ref, field_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ref_round_trip() {
        let field_ref = FieldRef::new("123", "title");
        assert_eq!(field_ref.to_string(), "title/123");
        let parsed: FieldRef = "title/123".parse().unwrap();
        assert_eq!(parsed, field_ref);
    }

    #[test]
    fn test_doc_ref_may_contain_separator() {
        let parsed: FieldRef = "body/docs/2024/01".parse().unwrap();
        assert_eq!(parsed.field_name(), "body");
        assert_eq!(parsed.doc_ref(), "docs/2024/01");
    }

    #[test]
    fn test_malformed_field_ref_fails() {
        assert!("no-separator".parse::<FieldRef>().is_err());
    }

    #[test]
    fn test_posting_serialises_with_index_key() {
        let mut posting = Posting {
            term_index: 7,
            fields: BTreeMap::new(),
        };
        posting
            .fields
            .entry("title".to_string())
            .or_default()
            .insert("doc-1".to_string(), TermMetadata::new());

        let json = serde_json::to_value(&posting).unwrap();
        assert_eq!(json["_index"], 7);
        assert!(json["title"]["doc-1"].is_object());

        let back: Posting = serde_json::from_value(json).unwrap();
        assert_eq!(back, posting);
    }
}
