//! Custom error types for scopusfetch.
//!
//! Only configuration and validation problems are surfaced to callers of a
//! fetch. HTTP failures during pagination are logged and end the result set.

use thiserror::Error;

/// Main error type for scopusfetch operations.
#[derive(Debug, Error)]
pub enum ScopusError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Scopus returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Response body or status text
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error (missing API key, bad base URL, ...)
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid search parameters
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ScopusError {
    /// True for errors raised before any request is sent.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_))
    }
}

/// Result type alias using `ScopusError`
pub type Result<T> = std::result::Result<T, ScopusError>;
