//! Error types for the listing service.

use thiserror::Error;

/// Errors that can occur while listing a remote folder.
#[derive(Error, Debug)]
pub enum DriveError {
    /// HTTP request failed (connection, timeout, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Remote API returned a non-success status.
    #[error("listing service error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body didn't have the expected shape.
    #[error("failed to parse listing response: {0}")]
    Parse(String),

    /// Client was configured with unusable values.
    #[error("invalid listing configuration: {0}")]
    InvalidConfig(String),

    /// Folder could not be reached for a reason outside HTTP.
    #[error("folder '{0}' is unavailable")]
    Unavailable(String),
}

impl DriveError {
    /// True for failures worth retrying on the next scheduled run:
    /// network trouble, timeouts, 5xx and rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Server { status, .. } => *status >= 500 || *status == 429,
            Self::Unavailable(_) => true,
            Self::Parse(_) | Self::InvalidConfig(_) => false,
        }
    }
}

/// Result type for listing operations.
pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server = |status| DriveError::Server {
            status,
            message: String::new(),
        };
        assert!(server(503).is_transient());
        assert!(server(429).is_transient());
        assert!(!server(404).is_transient());
        assert!(!DriveError::Parse("bad".into()).is_transient());
        assert!(DriveError::Unavailable("f".into()).is_transient());
    }
}
