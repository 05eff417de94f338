//! Canopy Sync - run orchestration
//!
//! Ties the pieces together for one pass over the configured roots:
//! pick the change filter, walk each root, and push every candidate file
//! through each ledger in turn. Failures stay local to the root, item or
//! ledger they happened in; the run always finishes with a [`SyncRun`]
//! summary.

mod orchestrator;
mod placeholder;
mod report;

pub use orchestrator::Orchestrator;
pub use placeholder::PlaceholderWriter;
pub use report::{SyncRun, TopicOutcome, TopicReport};
pub use tokio_util::sync::CancellationToken;
