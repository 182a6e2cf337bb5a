//! English stemming.

use rust_stemmers::{Algorithm, Stemmer as SnowballStemmer};

use crate::analysis::pipeline::PipelineFunction;
use crate::analysis::token::Token;

/// Reduces English tokens to their stem (`killed` → `kill`,
/// `waters` → `water`) so that inflected forms match each other.
pub struct Stemmer {
    stemmer: SnowballStemmer,
}

impl Default for Stemmer {
    fn default() -> Self {
        Stemmer {
            stemmer: SnowballStemmer::create(Algorithm::English),
        }
    }
}

impl std::fmt::Debug for Stemmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stemmer").finish()
    }
}

impl PipelineFunction for Stemmer {
    fn label(&self) -> &str {
        "stemmer"
    }

    fn run(&self, token: Token, _index: usize, _batch: &[Token]) -> Vec<Token> {
        vec![token.update(|term, _| self.stemmer.stem(term).into_owned())]
    }
}
