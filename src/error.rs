//! Error types for fairspan.

use thiserror::Error;

/// Result type for fairspan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fairspan operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An element index outside of a span.
    #[error("Index {index} out of bounds for span with {len} elements")]
    IndexOutOfBounds {
        /// Requested insertion index.
        index: usize,
        /// Current number of elements in the span.
        len: usize,
    },

    /// Gold and system documents are not sentence-aligned.
    #[error("Documents are not aligned: gold has {gold} sentences, system has {system}")]
    MismatchedDocuments {
        /// Sentence count of the gold document.
        gold: usize,
        /// Sentence count of the system document.
        system: usize,
    },

    /// Evaluation error.
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::Evaluation(msg.into())
    }
}
