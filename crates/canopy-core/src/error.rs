//! Error types for configuration loading.
//!
//! Configuration problems are the only fatal class of failure in a run.
//! Everything here is detected before the first remote call is made.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for functions that can fail while loading configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Things that can be wrong with the configuration of a run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required credential or setting was not provided.
    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    /// A setting was provided but can't be used as given.
    #[error("invalid value for '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// Couldn't read the roots file from disk.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The roots file isn't valid JSON or doesn't have the expected shape.
    #[error("malformed config file '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Two roots share a topic. Topics key the ledgers, so they must be unique.
    #[error("duplicate topic '{0}'")]
    DuplicateTopic(String),

    /// A root has an empty or whitespace-only topic.
    #[error("topic must not be blank")]
    BlankTopic,
}

impl ConfigError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-value error.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
