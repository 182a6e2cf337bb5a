//! # Lunaria
//!
//! A small, embeddable, in-memory full-text search engine. Build an
//! index once from a collection of JSON-like documents, then answer
//! ranked term, wildcard, fuzzy, field-scoped, boosted and
//! presence-filtered queries against it.
//!
//! ## Features
//!
//! - Pure Rust, no I/O: the whole index lives on the heap
//! - BM25 scoring over per-field sparse vectors
//! - Minimised token-set automata for wildcard and fuzzy matching
//! - A compact query syntax (`+title:plan*~2^10`) and a programmatic
//!   query builder
//! - Pluggable analysis pipelines with trimming, stop words and
//!   stemming by default
//! - A portable serialised form for pre-built indexes
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//!
//! let mut builder = lunaria::builder();
//! builder.reference("id")?;
//! builder.field("title")?;
//! builder.field("body")?;
//! builder.add(&json!({
//!     "id": "a",
//!     "title": "Grow your own plants",
//!     "body": "A green thumb is mostly patience.",
//! }))?;
//! let index = builder.build()?;
//!
//! let results = index.search("green plant*")?;
//! assert_eq!(results[0].doc_ref, "a");
//! # Ok::<(), lunaria::LunariaError>(())
//! ```

pub mod analysis;
pub mod error;
pub mod index;
pub mod match_data;
pub mod query;
pub mod token_set;
pub mod vector;

use std::sync::Arc;

// Re-exports for the public API
pub use analysis::pipeline::{Pipeline, PipelineFunction};
pub use analysis::token::{Token, TokenMetadata};
pub use analysis::token_filter::stem::Stemmer;
pub use analysis::token_filter::stop::StopWordFilter;
pub use analysis::token_filter::trim::Trimmer;
pub use error::{LunariaError, Result};
pub use index::builder::{FieldAttributes, IndexBuilder};
pub use index::posting::{FieldRef, Posting, TermMetadata as PostingMetadata};
pub use index::{Index, SearchResult, SerializedIndex};
pub use match_data::MatchData;
pub use query::{Clause, Presence, Query, Wildcard};
pub use token_set::TokenSet;
pub use vector::SparseVector;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An [`IndexBuilder`] with the default analysis wired in: field values
/// are trimmed, stop-word filtered and stemmed on the way into the
/// index, and query terms are stemmed to match.
pub fn builder() -> IndexBuilder {
    let mut builder = IndexBuilder::new();
    builder
        .pipeline_mut()
        .add(Arc::new(Trimmer))
        .add(Arc::new(StopWordFilter))
        .add(Arc::new(Stemmer::default()));
    builder
        .search_pipeline_mut()
        .add(Arc::new(Stemmer::default()));
    builder
}
