//! In-memory ledger.

use crate::error::{LedgerError, Result};
use crate::ledger::{Entry, Ledger, LedgerKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// A ledger held in a map. Used for dry runs and tests.
pub struct MemoryLedger {
    name: String,
    entries: Mutex<HashMap<LedgerKey, Entry>>,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Stores `entry` directly, bypassing the existence check.
    pub fn insert(&self, key: LedgerKey, entry: Entry) {
        self.lock().insert(key, entry);
    }

    pub fn get(&self, key: &LedgerKey) -> Option<Entry> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of entries stored under `topic`, placeholder included.
    pub fn count_for(&self, topic: &str) -> usize {
        self.lock()
            .keys()
            .filter(|k| k.topic_name() == topic)
            .count()
    }

    /// While set, every operation fails with [`LedgerError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable(self.name.clone()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LedgerKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &LedgerKey) -> Result<bool> {
        self.check_available()?;
        Ok(self.lock().contains_key(key))
    }

    async fn create(&self, key: &LedgerKey, entry: &Entry) -> Result<()> {
        self.check_available()?;
        let mut entries = self.lock();
        if entries.contains_key(key) {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }
        entries.insert(key.clone(), entry.clone());
        Ok(())
    }
}
