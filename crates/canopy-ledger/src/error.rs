//! Error types for ledger operations.

use thiserror::Error;

/// Errors that can occur while checking or writing a ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The key was created by someone else between our check and our
    /// write. Callers treat this as "not new", never as a failure.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("ledger backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Service credentials are unusable.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// Token exchange was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend configured with unusable values.
    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),

    /// Backend refused the write for a reason of its own.
    #[error("ledger '{0}' is unavailable")]
    Unavailable(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
