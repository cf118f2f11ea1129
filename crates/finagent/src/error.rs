//! Error types for the question-answering pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FinanceError>;

/// Errors that fail a whole request
#[derive(Debug, Error)]
pub enum FinanceError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Classification or decomposition failed
    #[error("Planning failed: {0}")]
    Planning(String),

    /// The reasoning agent failed on a query or sub-query
    #[error("Agent failed: {0}")]
    Agent(String),

    /// Sub-answers could not be combined
    #[error("Combining results failed: {0}")]
    Combiner(String),

    /// The query was rejected before any model call
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<minijinja::Error> for FinanceError {
    fn from(err: minijinja::Error) -> Self {
        FinanceError::Config(format!("prompt template: {err}"))
    }
}
