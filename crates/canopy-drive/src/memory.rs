//! In-memory listing service.
//!
//! Serves a fixed folder graph with the same filter semantics as the
//! remote API. Handy for offline runs and for exercising the walker
//! against awkward shapes (cycles, deep trees, failing folders).

use crate::error::{DriveError, Result};
use crate::listing::{ListingService, Page};
use crate::query::ListQuery;
use async_trait::async_trait;
use canopy_core::Item;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A folder graph held in memory.
///
/// The graph is keyed by parent id, so a folder may appear as a child of
/// any number of parents, itself included.
pub struct MemoryDrive {
    children: HashMap<String, Vec<Item>>,
    page_size: usize,
    failing: HashSet<String>,
    calls: Mutex<Vec<ListQuery>>,
}

impl Default for MemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self {
            children: HashMap::new(),
            page_size: 1000,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Builder pattern: set the page size (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Builder pattern: make every listing of `folder` fail.
    pub fn with_failing(mut self, folder: impl Into<String>) -> Self {
        self.failing.insert(folder.into());
        self
    }

    /// Adds `item` as a direct child of `parent`.
    pub fn insert(&mut self, parent: impl Into<String>, item: Item) {
        self.children.entry(parent.into()).or_default().push(item);
    }

    /// Number of page requests made for `parent`.
    pub fn listing_calls(&self, parent: &str) -> usize {
        self.lock_calls()
            .iter()
            .filter(|q| q.parent == parent)
            .count()
    }

    /// Number of page requests made overall.
    pub fn total_calls(&self) -> usize {
        self.lock_calls().len()
    }

    /// Every query received so far, in order.
    pub fn queries(&self) -> Vec<ListQuery> {
        self.lock_calls().clone()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<ListQuery>> {
        // A poisoned log is still a valid log.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn matches(query: &ListQuery, item: &Item) -> bool {
        if query.folders_only && !item.is_folder() {
            return false;
        }
        match query.modified_after {
            Some(cutoff) => item.modified_at.map_or(false, |at| at > cutoff),
            None => true,
        }
    }
}

#[async_trait]
impl ListingService for MemoryDrive {
    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page> {
        self.lock_calls().push(query.clone());

        if self.failing.contains(&query.parent) {
            return Err(DriveError::Unavailable(query.parent.clone()));
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| DriveError::Parse(format!("bad page token '{}'", token)))?,
            None => 0,
        };

        let matching: Vec<&Item> = self
            .children
            .get(&query.parent)
            .map(|items| items.iter().filter(|i| Self::matches(query, i)).collect())
            .unwrap_or_default();

        let end = (offset + self.page_size).min(matching.len());
        let items = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|i| (*i).clone())
            .collect();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(Page {
            items,
            next_page_token,
        })
    }
}
