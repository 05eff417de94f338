//! Error types for feed sync.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Remote API returned an error.
    #[error("feed backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response didn't have the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Client configured with unusable values.
    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
