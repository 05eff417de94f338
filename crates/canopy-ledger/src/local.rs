//! Local ledger backed by sled.
//!
//! One sled tree per ledger, so two independent ledgers can share a
//! database directory.

use crate::error::{LedgerError, Result};
use crate::ledger::{Entry, Ledger, LedgerKey};
use async_trait::async_trait;
use sled::{Db, Tree};
use std::path::Path;

pub struct SledLedger {
    name: String,
    tree: Tree,
}

impl SledLedger {
    /// Opens or creates the database at `path` and uses the tree `name`.
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(&db, name)
    }

    /// Uses the tree `name` of an already open database.
    pub fn from_db(db: &Db, name: &str) -> Result<Self> {
        let tree = db.open_tree(name)?;
        Ok(Self {
            name: name.to_string(),
            tree,
        })
    }

    /// Reads back a stored entry.
    pub fn get(&self, key: &LedgerKey) -> Result<Option<Entry>> {
        match self.tree.get(storage_key(key))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// `i:` prefix for items, `t:` for topic placeholders.
fn storage_key(key: &LedgerKey) -> Vec<u8> {
    match key {
        LedgerKey::Item { topic, id } => format!("i:{}/{}", topic, id).into_bytes(),
        LedgerKey::Topic { topic } => format!("t:{}", topic).into_bytes(),
    }
}

#[async_trait]
impl Ledger for SledLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.tree.contains_key(storage_key(key))?)
    }

    async fn create(&self, key: &LedgerKey, entry: &Entry) -> Result<()> {
        let bytes = bincode::serialize(entry)?;

        // Insert only if absent; sled does the check atomically.
        let swapped = self
            .tree
            .compare_and_swap(storage_key(key), None as Option<&[u8]>, Some(bytes))?;
        if swapped.is_err() {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }

        self.tree.flush()?;
        Ok(())
    }
}
