//! Change filtering.
//!
//! Decides which files of a tree are candidates in a run. Full mode is a
//! plain enumeration. Incremental mode keeps only files modified after a
//! cutoff, but still sweeps every subfolder: editing a file doesn't touch
//! its parent folder's modification time, so a new file can sit under a
//! chain of folders that all look stale.

use crate::enumerator::{enumerate, Traversal, WalkOptions, WalkResult};
use canopy_core::{Settings, SyncMode};
use canopy_drive::{ListQuery, ListingService};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use std::time::Instant;
use tracing::debug;

/// Which files of a tree a run looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Every file, no time filtering.
    Full,
    /// Only files modified strictly after `cutoff`.
    Incremental { cutoff: DateTime<Utc> },
}

impl ChangeFilter {
    /// Picks the filter for `settings` as of `now`.
    pub fn for_run(settings: &Settings, now: DateTime<Utc>) -> Self {
        match (settings.mode, settings.cutoff(now)) {
            (SyncMode::Incremental, Some(cutoff)) => Self::Incremental { cutoff },
            _ => Self::Full,
        }
    }

    /// Collects the candidate files below `root`.
    ///
    /// Both modes expand each folder at most once and treat a blank root
    /// as an empty tree.
    pub async fn collect<S>(&self, service: &S, root: &str, options: WalkOptions) -> WalkResult
    where
        S: ListingService + ?Sized,
    {
        match *self {
            Self::Full => enumerate(service, root, options).await,
            Self::Incremental { cutoff } => {
                let started = Instant::now();
                let root = root.trim();
                let mut traversal = Traversal::new(service, options);

                if !root.is_empty() {
                    traversal.expand_recent(root, cutoff).await;
                }
                traversal.finish(root, started)
            }
        }
    }
}

impl<'a, S> Traversal<'a, S>
where
    S: ListingService + ?Sized,
{
    fn expand_recent<'t>(&'t mut self, folder: &'t str, cutoff: DateTime<Utc>) -> BoxFuture<'t, ()> {
        async move {
            if !self.claim(folder) {
                return;
            }

            // Children touched since the cutoff: files are kept, folders
            // are expanded right away.
            let changed = self
                .list(ListQuery::children(folder).modified_after(cutoff))
                .await;
            for child in changed {
                if child.is_folder() {
                    self.expand_recent(&child.id, cutoff).await;
                } else {
                    self.accept(child);
                }
            }

            // Every subfolder, touched or not. Ones already expanded above
            // are skipped by the claim.
            let subfolders = self.list(ListQuery::children(folder).folders_only()).await;
            for sub in subfolders {
                debug!(folder = %sub.id, name = %sub.name, "Sweeping subfolder");
                self.expand_recent(&sub.id, cutoff).await;
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::{Item, Root};
    use canopy_drive::MemoryDrive;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn ids(result: &WalkResult) -> Vec<&str> {
        let mut ids: Vec<_> = result.files.iter().map(|f| f.id.as_str()).collect();
        ids.sort();
        ids
    }

    /// root -> [fileX (T0), folderY (T0) -> [fileZ (T5)]]
    fn scenario() -> MemoryDrive {
        let mut drive = MemoryDrive::new();
        drive.insert("root", Item::file("fileX", "x").with_modified(at(1)));
        drive.insert("root", Item::folder("folderY", "y").with_modified(at(1)));
        drive.insert("folderY", Item::file("fileZ", "z").with_modified(at(6)));
        drive
    }

    #[tokio::test]
    async fn test_incremental_then_full_scenario() {
        let drive = scenario();
        let incremental = ChangeFilter::Incremental { cutoff: at(4) };

        let result = incremental
            .collect(&drive, "root", WalkOptions::default())
            .await;
        assert_eq!(ids(&result), vec!["fileZ"]);

        let result = ChangeFilter::Full
            .collect(&drive, "root", WalkOptions::default())
            .await;
        assert_eq!(ids(&result), vec!["fileX", "fileZ"]);
    }

    #[tokio::test]
    async fn test_deep_file_below_stale_ancestors_is_found() {
        let mut drive = MemoryDrive::new();
        drive.insert("root", Item::folder("l1", "l1").with_modified(at(1)));
        drive.insert("l1", Item::folder("l2", "l2").with_modified(at(1)));
        drive.insert("l2", Item::folder("l3", "l3").with_modified(at(1)));
        drive.insert("l3", Item::file("new", "new.pdf").with_modified(at(20)));
        drive.insert("l3", Item::file("old", "old.pdf").with_modified(at(2)));

        let filter = ChangeFilter::Incremental { cutoff: at(10) };
        let result = filter.collect(&drive, "root", WalkOptions::default()).await;

        assert_eq!(ids(&result), vec!["new"]);
        assert_eq!(result.folders_visited, 4);
    }

    #[tokio::test]
    async fn test_recently_touched_folder_expanded_once() {
        let mut drive = MemoryDrive::new();
        drive.insert("root", Item::folder("hot", "hot").with_modified(at(20)));
        drive.insert("hot", Item::file("f", "f").with_modified(at(20)));

        let filter = ChangeFilter::Incremental { cutoff: at(10) };
        let result = filter.collect(&drive, "root", WalkOptions::default()).await;

        assert_eq!(ids(&result), vec!["f"]);
        // Two listings per folder: changed children and the subfolder sweep.
        assert_eq!(drive.listing_calls("hot"), 2);
        assert_eq!(drive.listing_calls("root"), 2);
    }

    #[tokio::test]
    async fn test_incremental_cycle_terminates() {
        let mut drive = MemoryDrive::new();
        drive.insert("a", Item::folder("b", "b").with_modified(at(1)));
        drive.insert("b", Item::folder("a", "a").with_modified(at(1)));
        drive.insert("b", Item::file("f", "f").with_modified(at(30)));

        let filter = ChangeFilter::Incremental { cutoff: at(10) };
        let result = filter.collect(&drive, "a", WalkOptions::default()).await;

        assert_eq!(ids(&result), vec!["f"]);
        assert_eq!(drive.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_cutoff_is_exclusive() {
        let mut drive = MemoryDrive::new();
        drive.insert("root", Item::file("edge", "edge").with_modified(at(10)));

        let filter = ChangeFilter::Incremental { cutoff: at(10) };
        let result = filter.collect(&drive, "root", WalkOptions::default()).await;
        assert!(result.files.is_empty());
    }

    #[tokio::test]
    async fn test_incremental_queries_carry_cutoff() {
        let drive = scenario();
        let filter = ChangeFilter::Incremental { cutoff: at(4) };
        filter.collect(&drive, "root", WalkOptions::default()).await;

        let queries = drive.queries();
        assert!(queries
            .iter()
            .any(|q| q.parent == "root" && q.modified_after == Some(at(4))));
        assert!(queries.iter().any(|q| q.parent == "root" && q.folders_only));
    }

    #[test]
    fn test_for_run() {
        let now = at(15);
        let roots = vec![Root::new("t", "f")];

        let full = Settings::new(SyncMode::Full, Duration::from_secs(86_400), roots.clone());
        assert_eq!(ChangeFilter::for_run(&full, now), ChangeFilter::Full);

        let inc = Settings::new(SyncMode::Incremental, Duration::from_secs(86_400), roots);
        assert_eq!(
            ChangeFilter::for_run(&inc, now),
            ChangeFilter::Incremental { cutoff: at(14) }
        );
    }
}
