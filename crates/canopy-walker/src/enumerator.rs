//! Tree enumeration.
//!
//! Expands a remote folder hierarchy into the flat list of files below
//! it. Folders are the recursion unit and are expanded at most once per
//! walk, so cyclic or self-referential folder graphs terminate.

use canopy_core::Item;
use canopy_drive::{list_children, ListQuery, ListingService};
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Folder ids already expanded during one walk.
///
/// Scoped to a single root traversal and dropped with it.
#[derive(Debug, Default)]
pub struct VisitedSet {
    folders: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `folder` as expanded. Returns false if it already was.
    pub fn insert(&mut self, folder: &str) -> bool {
        self.folders.insert(folder.to_string())
    }

    pub fn contains(&self, folder: &str) -> bool {
        self.folders.contains(folder)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Options for a walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Pause between pages of the same folder listing.
    pub page_delay: Duration,
}

/// A folder whose listing failed. Its subtree counted as empty.
#[derive(Debug, Clone)]
pub struct WalkFailure {
    pub folder: String,
    pub message: String,

    /// Whether the next scheduled run is likely to succeed.
    pub transient: bool,
}

/// Result of walking one root.
#[derive(Debug, Default)]
pub struct WalkResult {
    /// The root that was walked.
    pub root: String,

    /// Every distinct file found, in discovery order.
    pub files: Vec<Item>,

    /// Number of folders expanded (root included).
    pub folders_visited: usize,

    /// Listings that failed.
    pub failures: Vec<WalkFailure>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl WalkResult {
    /// True when every listing in the walk succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when the root folder itself couldn't be listed, which means
    /// nothing at all is known about this tree.
    pub fn root_failed(&self) -> bool {
        self.failures.iter().any(|f| f.folder == self.root)
    }
}

/// State for one traversal. Never shared across roots or runs.
pub(crate) struct Traversal<'a, S: ?Sized> {
    service: &'a S,
    options: WalkOptions,
    visited: VisitedSet,
    seen_files: HashSet<String>,
    files: Vec<Item>,
    failures: Vec<WalkFailure>,
}

impl<'a, S> Traversal<'a, S>
where
    S: ListingService + ?Sized,
{
    pub(crate) fn new(service: &'a S, options: WalkOptions) -> Self {
        Self {
            service,
            options,
            visited: VisitedSet::new(),
            seen_files: HashSet::new(),
            files: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Claims `folder` for expansion. Must be called before any listing
    /// of it, so a repeated folder costs no remote calls.
    pub(crate) fn claim(&mut self, folder: &str) -> bool {
        if self.visited.insert(folder) {
            true
        } else {
            debug!(folder = %folder, "Already expanded, skipping");
            false
        }
    }

    /// Lists `query` fully. A failure is recorded and reads as no children.
    pub(crate) async fn list(&mut self, query: ListQuery) -> Vec<Item> {
        match list_children(self.service, &query, self.options.page_delay).await {
            Ok(items) => items,
            Err(e) => {
                warn!(folder = %query.parent, "Failed to list folder: {}", e);
                self.failures.push(WalkFailure {
                    folder: query.parent,
                    transient: e.is_transient(),
                    message: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Keeps a file, once per id.
    pub(crate) fn accept(&mut self, file: Item) {
        if self.seen_files.insert(file.id.clone()) {
            self.files.push(file);
        }
    }

    fn expand<'t>(&'t mut self, folder: &'t str) -> BoxFuture<'t, ()> {
        async move {
            if !self.claim(folder) {
                return;
            }

            for child in self.list(ListQuery::children(folder)).await {
                if child.is_folder() {
                    debug!(folder = %child.id, name = %child.name, "Entering subfolder");
                    self.expand(&child.id).await;
                } else {
                    self.accept(child);
                }
            }
        }
        .boxed()
    }

    pub(crate) fn finish(self, root: &str, started: Instant) -> WalkResult {
        let result = WalkResult {
            root: root.to_string(),
            files: self.files,
            folders_visited: self.visited.len(),
            failures: self.failures,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            root = %root,
            files = result.files.len(),
            folders = result.folders_visited,
            failures = result.failures.len(),
            "Walked tree in {}ms",
            result.duration_ms
        );
        result
    }
}

/// Enumerates every file reachable from `root`.
///
/// A blank `root` means the topic has no source: the result is empty and
/// no remote call is made.
///
/// # Example
///
/// ```no_run
/// use canopy_drive::{DriveClient, DriveConfig};
/// use canopy_walker::{enumerate, WalkOptions};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let drive = DriveClient::new(DriveConfig::new("api-key"))?;
/// let result = enumerate(&drive, "1AbCdEf", WalkOptions::default()).await;
/// println!("{} files in {} folders", result.files.len(), result.folders_visited);
/// # Ok(())
/// # }
/// ```
pub async fn enumerate<S>(service: &S, root: &str, options: WalkOptions) -> WalkResult
where
    S: ListingService + ?Sized,
{
    let started = Instant::now();
    let root = root.trim();
    let mut traversal = Traversal::new(service, options);

    if !root.is_empty() {
        traversal.expand(root).await;
    }
    traversal.finish(root, started)
}
