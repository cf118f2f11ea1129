//! Error types for market data operations

use thiserror::Error;

/// Result type alias for market data operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Market data errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with something we could not read
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider reported an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Start date after end date
    #[error("Invalid date range: {start} > {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Indicator could not be computed
    #[error("Indicator error: {0}")]
    Indicator(String),
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::InvalidResponse(err.to_string())
    }
}
