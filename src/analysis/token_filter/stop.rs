//! English stop-word removal.

use std::sync::LazyLock;

use ahash::AHashSet;

use crate::analysis::pipeline::PipelineFunction;
use crate::analysis::token::Token;

static STOP_WORDS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "able", "about", "across", "after", "all", "almost", "also", "am", "among", "an",
        "and", "any", "are", "as", "at", "be", "because", "been", "but", "by", "can", "cannot",
        "could", "dear", "did", "do", "does", "either", "else", "ever", "every", "for", "from",
        "get", "got", "had", "has", "have", "he", "her", "hers", "him", "his", "how", "however",
        "i", "if", "in", "into", "is", "it", "its", "just", "least", "let", "like", "likely",
        "may", "me", "might", "most", "must", "my", "neither", "no", "nor", "not", "of", "off",
        "often", "on", "only", "or", "other", "our", "own", "rather", "said", "say", "says",
        "she", "should", "since", "so", "some", "than", "that", "the", "their", "them", "then",
        "there", "these", "they", "this", "tis", "to", "too", "twas", "us", "wants", "was", "we",
        "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
        "would", "yet", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Drops common English words that carry no search signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopWordFilter;

impl PipelineFunction for StopWordFilter {
    fn label(&self) -> &str {
        "stopWordFilter"
    }

    fn run(&self, token: Token, _index: usize, _batch: &[Token]) -> Vec<Token> {
        if STOP_WORDS.contains(token.as_str()) {
            Vec::new()
        } else {
            vec![token]
        }
    }
}
