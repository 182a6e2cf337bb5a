//! Trimming of leading and trailing punctuation.

use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::pipeline::PipelineFunction;
use crate::analysis::token::Token;

static LEADING_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\W+").expect("pattern is valid"));
static TRAILING_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+$").expect("pattern is valid"));

/// Strips non-word characters from both ends of a token, so that
/// `"hello."` and `"(hello)"` index as `hello`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trimmer;

impl PipelineFunction for Trimmer {
    fn label(&self) -> &str {
        "trimmer"
    }

    fn run(&self, token: Token, _index: usize, _batch: &[Token]) -> Vec<Token> {
        vec![token.update(|term, _| {
            let trimmed = LEADING_NON_WORD.replace(term, "");
            TRAILING_NON_WORD.replace(&trimmed, "").into_owned()
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::TokenMetadata;

    fn trim(term: &str) -> String {
        let output = Trimmer.run(Token::new(term, TokenMetadata::new()), 0, &[]);
        output[0].as_str().to_string()
    }

    #[test]
    fn test_latin_characters_pass_through() {
        assert_eq!(trim("hello"), "hello");
    }

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(trim("hello."), "hello");
        assert_eq!(trim("it's"), "it's");
        assert_eq!(trim("james'"), "james");
        assert_eq!(trim("stop!"), "stop");
        assert_eq!(trim("first,"), "first");
        assert_eq!(trim("[tag]"), "tag");
    }

    #[test]
    fn test_all_punctuation_trims_to_empty() {
        assert_eq!(trim("..."), "");
    }
}
