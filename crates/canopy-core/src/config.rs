//! Run configuration.
//!
//! A [`Settings`] value is built once at startup and passed explicitly
//! into the orchestrator. Nothing in here is global, and nothing changes
//! while a run is in progress.

use crate::error::{ConfigError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Per-request timeout for every remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default incremental lookback window.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(48 * 60 * 60);

/// Whether a run rescans everything or only a recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Enumerate whole trees, no time filtering.
    #[default]
    Full,
    /// Only files modified after `now - lookback`.
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "incremental" | "inc" => Ok(Self::Incremental),
            other => Err(ConfigError::invalid(
                "mode",
                format!("expected 'full' or 'incremental', got '{}'", other),
            )),
        }
    }
}

/// A configured (topic, remote folder) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Ledger key prefix, unique per configuration.
    pub topic: String,

    /// Remote folder id. Empty means the topic has no source yet.
    #[serde(default)]
    pub folder: String,
}

impl Root {
    pub fn new(topic: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            folder: folder.into(),
        }
    }

    /// False when the folder reference is empty or blank.
    pub fn has_source(&self) -> bool {
        !self.folder.trim().is_empty()
    }
}

/// On-disk list of roots (`canopy.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootsFile {
    pub roots: Vec<Root>,
}

impl RootsFile {
    /// Reads and validates a roots file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let file: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Writes the file as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|e| ConfigError::io(path, e))
    }

    /// A starter file with one sourced and one unsourced topic.
    pub fn template() -> Self {
        Self {
            roots: vec![
                Root::new("Example_Topic_S1", "<drive-folder-id>"),
                Root::new("Example_Topic_S2", ""),
            ],
        }
    }

    /// Rejects blank and duplicate topics.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for root in &self.roots {
            if root.topic.trim().is_empty() {
                return Err(ConfigError::BlankTopic);
            }
            if !seen.insert(root.topic.as_str()) {
                return Err(ConfigError::DuplicateTopic(root.topic.clone()));
            }
        }
        Ok(())
    }
}

/// Deliberate pauses that keep the burst rate under remote API limits.
///
/// None of these affect correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between pages of one folder listing.
    pub page_delay: Duration,
    /// Between items within a root.
    pub item_delay: Duration,
    /// Between roots.
    pub root_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(100),
            item_delay: Duration::from_millis(50),
            root_delay: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// No delays at all.
    pub fn none() -> Self {
        Self {
            page_delay: Duration::ZERO,
            item_delay: Duration::ZERO,
            root_delay: Duration::ZERO,
        }
    }
}

/// Immutable configuration for one orchestration pass.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: SyncMode,

    /// Incremental window. Must exceed the scheduling interval between
    /// runs, otherwise files modified in the gap are never seen.
    pub lookback: Duration,

    pub roots: Vec<Root>,
    pub pacing: Pacing,
    pub request_timeout: Duration,
}

impl Settings {
    /// Creates settings with default pacing and timeout.
    pub fn new(mode: SyncMode, lookback: Duration, roots: Vec<Root>) -> Self {
        Self {
            mode,
            lookback,
            roots,
            pacing: Pacing::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Builder pattern: set pacing.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Builder pattern: set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks everything that can be checked without a remote call.
    pub fn validate(&self) -> Result<()> {
        RootsFile {
            roots: self.roots.clone(),
        }
        .validate()?;

        if self.mode == SyncMode::Incremental && self.lookback.is_zero() {
            return Err(ConfigError::invalid(
                "lookback",
                "incremental mode needs a non-zero lookback",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout", "must be non-zero"));
        }
        Ok(())
    }

    /// The incremental cutoff relative to `now`, or `None` in full mode.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.mode {
            SyncMode::Full => None,
            SyncMode::Incremental => {
                let lookback = chrono::Duration::from_std(self.lookback)
                    .unwrap_or_else(|_| chrono::Duration::max_value());
                Some(now.checked_sub_signed(lookback).unwrap_or(DateTime::<Utc>::MIN_UTC))
            }
        }
    }
}

/// Unwraps a required credential, treating blank values as missing.
pub fn require(name: &'static str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}
