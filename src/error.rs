//! Error types for Lunaria.

use thiserror::Error;

/// The error type for all fallible Lunaria operations.
#[derive(Error, Debug)]
pub enum LunariaError {
    /// Invalid configuration of a builder, field, or vector.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A build-time invariant was violated.
    #[error("Build error: {0}")]
    Build(String),

    /// A query string failed to parse. Positions are byte offsets into
    /// the source string, suitable for slicing it.
    #[error("Query parse error: {message} (at {start}..{end})")]
    QueryParse {
        message: String,
        start: usize,
        end: usize,
    },

    /// A pipeline could not be assembled or loaded.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl LunariaError {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        LunariaError::Config(message.into())
    }

    /// Create a build error.
    pub fn build<S: Into<String>>(message: S) -> Self {
        LunariaError::Build(message.into())
    }

    /// Create a query parse error spanning bytes `start..end` of the
    /// source string.
    pub fn query_parse<S: Into<String>>(message: S, start: usize, end: usize) -> Self {
        LunariaError::QueryParse {
            message: message.into(),
            start,
            end,
        }
    }

    /// Create a pipeline error.
    pub fn pipeline<S: Into<String>>(message: S) -> Self {
        LunariaError::Pipeline(message.into())
    }
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LunariaError>;
