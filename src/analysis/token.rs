//! Token representation.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Metadata attached to a token as it flows through the pipeline.
///
/// Keys are open-ended; the tokenizer records `position` and `index`,
/// and the builder injects `fields`. Values accumulate into postings
/// when whitelisted.
pub type TokenMetadata = BTreeMap<String, Value>;

/// A unit of text flowing through the analysis pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    term: String,
    metadata: TokenMetadata,
}

impl Token {
    /// Create a token with the given string form and metadata.
    pub fn new<S: Into<String>>(term: S, metadata: TokenMetadata) -> Self {
        Token {
            term: term.into(),
            metadata,
        }
    }

    /// The current string form of the token.
    pub fn as_str(&self) -> &str {
        &self.term
    }

    /// The token's metadata.
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Mutable access to the token's metadata.
    pub fn metadata_mut(&mut self) -> &mut TokenMetadata {
        &mut self.metadata
    }

    /// Replace the string form with the result of `f`, keeping metadata.
    pub fn update<F>(mut self, f: F) -> Token
    where
        F: FnOnce(&str, &TokenMetadata) -> String,
    {
        self.term = f(&self.term, &self.metadata);
        self
    }

    /// A copy of this token with its string form mapped through `f`.
    pub fn clone_with<F>(&self, f: F) -> Token
    where
        F: FnOnce(&str, &TokenMetadata) -> String,
    {
        self.clone().update(f)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_replaces_term_and_keeps_metadata() {
        let mut metadata = TokenMetadata::new();
        metadata.insert("index".to_string(), serde_json::json!(0));
        let token = Token::new("foo", metadata.clone());
        let updated = token.update(|term, _| term.to_uppercase());
        assert_eq!(updated.as_str(), "FOO");
        assert_eq!(updated.metadata(), &metadata);
    }

    #[test]
    fn test_clone_with_leaves_original_untouched() {
        let token = Token::new("foo", TokenMetadata::new());
        let clone = token.clone_with(|term, _| format!("{term}bar"));
        assert_eq!(token.as_str(), "foo");
        assert_eq!(clone.as_str(), "foobar");
    }
}
