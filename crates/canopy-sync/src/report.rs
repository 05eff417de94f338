//! Run summaries.

use canopy_core::SyncMode;
use std::time::Duration;

/// What happened to one root during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicOutcome {
    /// The tree was walked and its files pushed through the ledgers.
    Synced {
        /// Candidate files found by the walk.
        found: usize,
        /// Files at least one ledger recorded for the first time.
        new: usize,
        /// Subfolders whose listing failed (counted as empty).
        skipped_folders: usize,
        /// Individual ledger writes that failed.
        ledger_failures: usize,
        /// Ledgers that received a fresh empty-topic placeholder.
        placeholders: usize,
    },
    /// The root has no folder configured.
    NoSource,
    /// The root folder itself couldn't be listed.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicReport {
    pub topic: String,
    pub outcome: TopicOutcome,
}

impl TopicReport {
    /// New records contributed by this topic (zero unless synced).
    pub fn new_count(&self) -> usize {
        match self.outcome {
            TopicOutcome::Synced { new, .. } => new,
            _ => 0,
        }
    }
}

/// Summary of one orchestration pass. Never persisted.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub mode: SyncMode,
    pub lookback: Duration,
    pub topics: Vec<TopicReport>,
    pub total_new: usize,
    pub elapsed: Duration,

    /// True when a stop request ended the run before every root was seen.
    pub interrupted: bool,
}

impl SyncRun {
    /// Report for `topic`, if that root was reached.
    pub fn topic(&self, topic: &str) -> Option<&TopicReport> {
        self.topics.iter().find(|t| t.topic == topic)
    }

    pub fn failed_count(&self) -> usize {
        self.topics
            .iter()
            .filter(|t| matches!(t.outcome, TopicOutcome::Failed { .. }))
            .count()
    }
}
