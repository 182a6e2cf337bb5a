//! Text analysis for Lunaria.
//!
//! Field values and query terms pass through the same machinery: the
//! tokenizer splits text into [`Token`]s carrying positional metadata,
//! and a [`Pipeline`] of registered functions transforms, expands, or
//! drops tokens before they reach the index.
//!
//! ```text
//! Field value → Tokenizer → Token batch → Pipeline functions → Terms
//! ```

pub mod pipeline;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use pipeline::{Pipeline, PipelineFunction};
pub use token::{Token, TokenMetadata};
pub use token_filter::stem::Stemmer;
pub use token_filter::stop::StopWordFilter;
pub use token_filter::trim::Trimmer;
pub use tokenizer::{is_separator, tokenize};
