//! Splitting field values and query strings into tokens.

use serde_json::Value;

use super::token::{Token, TokenMetadata};

/// Whether `c` separates tokens: whitespace or hyphen.
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-'
}

/// Tokenize a JSON value.
///
/// - `None` and `null` produce no tokens.
/// - An array yields one token per element, stringified and lowercased,
///   without positional metadata.
/// - Any other value is stringified, lowercased, and split on
///   [`is_separator`] characters. Each token records its
///   `position: [start, length]` (in characters) and `index` ordinal,
///   on top of a copy of `metadata`.
pub fn tokenize(value: Option<&Value>, metadata: &TokenMetadata) -> Vec<Token> {
    let value = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(value) => value,
    };

    if let Value::Array(elements) = value {
        return elements
            .iter()
            .map(|element| Token::new(as_string(element).to_lowercase(), metadata.clone()))
            .collect();
    }

    tokenize_text(&as_string(value), metadata)
}

/// Tokenize plain text: lowercase, then split on separator characters,
/// recording character positions.
pub fn tokenize_text(text: &str, metadata: &TokenMetadata) -> Vec<Token> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut tokens = Vec::new();
    let mut slice_start = 0;

    for slice_end in 0..=chars.len() {
        let at_boundary = slice_end == chars.len() || is_separator(chars[slice_end]);
        if !at_boundary {
            continue;
        }

        let slice_length = slice_end - slice_start;
        if slice_length > 0 {
            let mut token_metadata = metadata.clone();
            token_metadata.insert(
                "position".to_string(),
                serde_json::json!([slice_start, slice_length]),
            );
            token_metadata.insert("index".to_string(), serde_json::json!(tokens.len()));

            let term: String = chars[slice_start..slice_end].iter().collect();
            tokens.push(Token::new(term, token_metadata));
        }
        slice_start = slice_end + 1;
    }

    tokens
}

/// The string form of a JSON value: strings verbatim, anything else in
/// its JSON rendering.
pub(crate) fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
