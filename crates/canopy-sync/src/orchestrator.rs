//! The sync pass.

use crate::placeholder::PlaceholderWriter;
use crate::report::{SyncRun, TopicOutcome, TopicReport};
use canopy_core::{Item, Root, Settings, SyncMode};
use canopy_drive::ListingService;
use canopy_ledger::Ledger;
use canopy_walker::{ChangeFilter, WalkOptions};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs one pass over the configured roots.
///
/// Roots are processed one at a time, items within a root one at a time,
/// and each item is offered to the ledgers in order. Nothing is shared
/// between roots except the counters this struct owns.
pub struct Orchestrator {
    settings: Settings,
    listing: Arc<dyn ListingService>,
    ledgers: Vec<Arc<dyn Ledger>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        listing: Arc<dyn ListingService>,
        ledgers: Vec<Arc<dyn Ledger>>,
    ) -> Self {
        Self {
            settings,
            listing,
            ledgers,
            cancel: CancellationToken::new(),
        }
    }

    /// Builder pattern: stop before the next root once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes every root and returns the summary.
    ///
    /// Never fails as a whole: per-root, per-item and per-ledger errors
    /// are logged and show up in the report.
    pub async fn run(&self) -> SyncRun {
        let started = Instant::now();
        let filter = ChangeFilter::for_run(&self.settings, Utc::now());

        info!(
            mode = %self.settings.mode,
            roots = self.settings.roots.len(),
            ledgers = self.ledgers.len(),
            "Starting sync"
        );
        if let ChangeFilter::Incremental { cutoff } = filter {
            info!(cutoff = %cutoff, "Incremental window");
        }

        let mut topics = Vec::with_capacity(self.settings.roots.len());
        let mut total_new = 0;
        let mut interrupted = false;

        for (index, root) in self.settings.roots.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    remaining = self.settings.roots.len() - index,
                    "Stop requested, leaving remaining roots for the next run"
                );
                interrupted = true;
                break;
            }
            if index > 0 {
                self.pause(self.settings.pacing.root_delay).await;
            }

            let report = self.sync_root(root, filter).await;
            total_new += report.new_count();
            topics.push(report);
        }

        let elapsed = started.elapsed();
        info!(total_new, "Sync finished in {:?}", elapsed);

        SyncRun {
            mode: self.settings.mode,
            lookback: self.settings.lookback,
            topics,
            total_new,
            elapsed,
            interrupted,
        }
    }

    async fn sync_root(&self, root: &Root, filter: ChangeFilter) -> TopicReport {
        let topic = root.topic.clone();

        if !root.has_source() {
            info!(topic = %topic, "No source folder configured, skipping");
            return TopicReport {
                topic,
                outcome: TopicOutcome::NoSource,
            };
        }

        info!(topic = %topic, folder = %root.folder, "Processing root");
        let options = WalkOptions {
            page_delay: self.settings.pacing.page_delay,
        };
        let walk = filter.collect(self.listing.as_ref(), &root.folder, options).await;

        if walk.root_failed() {
            let reason = walk
                .failures
                .iter()
                .find(|f| f.folder == walk.root)
                .map(|f| f.message.clone())
                .unwrap_or_default();
            warn!(topic = %topic, "Root could not be listed: {}", reason);
            return TopicReport {
                topic,
                outcome: TopicOutcome::Failed { reason },
            };
        }

        info!(topic = %topic, files = walk.files.len(), "Found candidate files");

        // Only a complete full walk proves the tree is empty.
        let mut placeholders = 0;
        let mut ledger_failures = 0;
        if walk.files.is_empty() && self.settings.mode == SyncMode::Full && walk.is_complete() {
            let (created, failed) = PlaceholderWriter::new(&self.ledgers)
                .ensure_placeholder(&topic)
                .await;
            placeholders = created;
            ledger_failures += failed;
        }

        let mut new = 0;
        for (index, item) in walk.files.iter().enumerate() {
            if index > 0 {
                self.pause(self.settings.pacing.item_delay).await;
            }

            let (is_new, failures) = self.record(&topic, item).await;
            ledger_failures += failures;
            if is_new {
                info!(topic = %topic, name = %item.name, "New file recorded");
                new += 1;
            }
        }

        if new == 0 {
            info!(topic = %topic, "No new files");
        } else {
            info!(topic = %topic, new, "Added new files");
        }

        TopicReport {
            topic,
            outcome: TopicOutcome::Synced {
                found: walk.files.len(),
                new,
                skipped_folders: walk.failures.len(),
                ledger_failures,
                placeholders,
            },
        }
    }

    /// Offers `item` to every ledger in order. The item is new if any
    /// ledger created a record for it.
    async fn record(&self, topic: &str, item: &Item) -> (bool, usize) {
        let mut is_new = false;
        let mut failures = 0;

        for ledger in &self.ledgers {
            match ledger.try_record(topic, item).await {
                Ok(true) => {
                    debug!(ledger = ledger.name(), id = %item.id, "Saved");
                    is_new = true;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        ledger = ledger.name(),
                        topic = %topic,
                        id = %item.id,
                        "Failed to record file: {}",
                        e
                    );
                    failures += 1;
                }
            }
        }
        (is_new, failures)
    }

    async fn pause(&self, delay: std::time::Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::{Pacing, Record};
    use canopy_drive::MemoryDrive;
    use canopy_ledger::{Entry, LedgerKey, MemoryLedger};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    struct Fixture {
        a: Arc<MemoryLedger>,
        b: Arc<MemoryLedger>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                a: Arc::new(MemoryLedger::new("a")),
                b: Arc::new(MemoryLedger::new("b")),
            }
        }

        fn orchestrator(&self, drive: Arc<MemoryDrive>, settings: Settings) -> Orchestrator {
            let ledgers: Vec<Arc<dyn Ledger>> = vec![self.a.clone(), self.b.clone()];
            Orchestrator::new(settings, drive, ledgers)
        }
    }

    fn settings(mode: SyncMode, roots: Vec<Root>) -> Settings {
        Settings::new(mode, Duration::from_secs(2 * 24 * 3600), roots).with_pacing(Pacing::none())
    }

    fn simple_drive() -> Arc<MemoryDrive> {
        let mut drive = MemoryDrive::new();
        drive.insert("folder-1", Item::file("f1", "one.pdf"));
        drive.insert("folder-1", Item::folder("sub", "sub"));
        drive.insert("sub", Item::file("f2", "two.pdf"));
        Arc::new(drive)
    }

    #[tokio::test]
    async fn test_records_every_file_once() {
        let fx = Fixture::new();
        let drive = simple_drive();
        let orch = fx.orchestrator(drive, settings(SyncMode::Full, vec![Root::new("t", "folder-1")]));

        let run = orch.run().await;
        assert_eq!(run.total_new, 2);
        assert_eq!(fx.a.count_for("t"), 2);
        assert_eq!(fx.b.count_for("t"), 2);

        let again = orch.run().await;
        assert_eq!(again.total_new, 0);
        assert_eq!(fx.a.len(), 2);
        assert_eq!(fx.b.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_source_is_skipped() {
        let fx = Fixture::new();
        let drive = Arc::new(MemoryDrive::new());
        let orch = fx.orchestrator(drive.clone(), settings(SyncMode::Full, vec![Root::new("t", "")]));

        let run = orch.run().await;
        assert_eq!(run.total_new, 0);
        assert_eq!(run.topic("t").unwrap().outcome, TopicOutcome::NoSource);
        assert_eq!(drive.total_calls(), 0);
        assert!(fx.a.is_empty());
    }

    #[tokio::test]
    async fn test_divergent_ledgers() {
        let fx = Fixture::new();
        let existing = Record::new("t", &Item::file("f1", "old-name.pdf"), Utc::now());
        fx.a.insert(LedgerKey::item("t", "f1"), Entry::Record(existing.clone()));

        let mut drive = MemoryDrive::new();
        drive.insert("folder-1", Item::file("f1", "one.pdf"));
        let orch = fx.orchestrator(
            Arc::new(drive),
            settings(SyncMode::Full, vec![Root::new("t", "folder-1")]),
        );

        let run = orch.run().await;
        assert_eq!(run.total_new, 1);
        assert_eq!(
            fx.a.get(&LedgerKey::item("t", "f1")),
            Some(Entry::Record(existing))
        );
        assert_eq!(fx.b.count_for("t"), 1);
    }

    #[tokio::test]
    async fn test_placeholder_for_empty_tree() {
        let fx = Fixture::new();
        let mut drive = MemoryDrive::new();
        drive.insert("empty", Item::folder("hollow", "hollow"));
        let orch = fx.orchestrator(
            Arc::new(drive),
            settings(SyncMode::Full, vec![Root::new("t", "empty")]),
        );

        let run = orch.run().await;
        assert_eq!(run.total_new, 0);
        assert!(matches!(
            run.topic("t").unwrap().outcome,
            TopicOutcome::Synced { placeholders: 2, .. }
        ));
        assert!(matches!(
            fx.a.get(&LedgerKey::topic("t")),
            Some(Entry::Placeholder(_))
        ));
        assert_eq!(fx.b.count_for("t"), 1);

        orch.run().await;
        assert_eq!(fx.a.count_for("t"), 1);
        assert_eq!(fx.b.count_for("t"), 1);
    }

    #[tokio::test]
    async fn test_no_placeholder_in_incremental_mode() {
        let fx = Fixture::new();
        let drive = Arc::new(MemoryDrive::new());
        let orch = fx.orchestrator(
            drive,
            settings(SyncMode::Incremental, vec![Root::new("t", "empty")]),
        );

        orch.run().await;
        assert!(fx.a.is_empty());
        assert!(fx.b.is_empty());
    }

    #[tokio::test]
    async fn test_no_placeholder_when_a_subtree_failed() {
        let fx = Fixture::new();
        let mut drive = MemoryDrive::new().with_failing("broken");
        drive.insert("root", Item::folder("broken", "broken"));
        let orch = fx.orchestrator(
            Arc::new(drive),
            settings(SyncMode::Full, vec![Root::new("t", "root")]),
        );

        let run = orch.run().await;
        assert!(matches!(
            run.topic("t").unwrap().outcome,
            TopicOutcome::Synced { skipped_folders: 1, placeholders: 0, .. }
        ));
        assert!(fx.a.is_empty());
    }

    #[tokio::test]
    async fn test_failed_root_does_not_stop_the_batch() {
        let fx = Fixture::new();
        let mut drive = MemoryDrive::new().with_failing("down");
        drive.insert("up", Item::file("f1", "one.pdf"));
        let orch = fx.orchestrator(
            Arc::new(drive),
            settings(
                SyncMode::Full,
                vec![Root::new("first", "down"), Root::new("second", "up")],
            ),
        );

        let run = orch.run().await;
        assert!(matches!(
            run.topic("first").unwrap().outcome,
            TopicOutcome::Failed { .. }
        ));
        assert_eq!(run.topic("second").unwrap().new_count(), 1);
        assert_eq!(run.total_new, 1);
        assert_eq!(run.failed_count(), 1);
        // A failed root is not proof of an empty one.
        assert_eq!(fx.a.count_for("first"), 0);
    }

    #[tokio::test]
    async fn test_ledger_failure_does_not_block_the_other() {
        let fx = Fixture::new();
        fx.a.set_failing(true);
        let orch = fx.orchestrator(
            simple_drive(),
            settings(SyncMode::Full, vec![Root::new("t", "folder-1")]),
        );

        let run = orch.run().await;
        assert_eq!(run.total_new, 2);
        assert_eq!(fx.b.count_for("t"), 2);
        assert!(matches!(
            run.topic("t").unwrap().outcome,
            TopicOutcome::Synced { ledger_failures: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_next_root() {
        let fx = Fixture::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = fx
            .orchestrator(
                simple_drive(),
                settings(SyncMode::Full, vec![Root::new("t", "folder-1")]),
            )
            .with_cancellation(cancel);

        let run = orch.run().await;
        assert!(run.interrupted);
        assert!(run.topics.is_empty());
        assert!(fx.a.is_empty());
    }

    #[tokio::test]
    async fn test_incremental_then_full() {
        let fx = Fixture::new();
        let now = Utc::now();
        let mut drive = MemoryDrive::new();
        drive.insert(
            "root",
            Item::file("fileX", "x").with_modified(now - ChronoDuration::days(10)),
        );
        drive.insert(
            "root",
            Item::folder("folderY", "y").with_modified(now - ChronoDuration::days(10)),
        );
        drive.insert(
            "folderY",
            Item::file("fileZ", "z").with_modified(now - ChronoDuration::hours(1)),
        );
        let drive = Arc::new(drive);
        let roots = vec![Root::new("t", "root")];

        let run = fx
            .orchestrator(drive.clone(), settings(SyncMode::Incremental, roots.clone()))
            .run()
            .await;
        assert_eq!(run.total_new, 1);
        assert!(fx.a.get(&LedgerKey::item("t", "fileZ")).is_some());

        let run = fx
            .orchestrator(drive, settings(SyncMode::Full, roots))
            .run()
            .await;
        assert_eq!(run.total_new, 1);
        assert!(fx.a.get(&LedgerKey::item("t", "fileX")).is_some());
    }
}
