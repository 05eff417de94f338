//! The ledger contract.

use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use canopy_core::{Item, Placeholder, Record};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Where an entry lives in a ledger.
///
/// Each backend maps keys onto its own path layout; the keyspaces are
/// equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKey {
    /// A discovered file under a topic.
    Item { topic: String, id: String },
    /// The topic itself, used for the empty-topic placeholder.
    Topic { topic: String },
}

impl LedgerKey {
    pub fn item(topic: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Item {
            topic: topic.into(),
            id: id.into(),
        }
    }

    pub fn topic(topic: impl Into<String>) -> Self {
        Self::Topic {
            topic: topic.into(),
        }
    }

    pub fn topic_name(&self) -> &str {
        match self {
            Self::Item { topic, .. } | Self::Topic { topic } => topic,
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item { topic, id } => write!(f, "{}/{}", topic, id),
            Self::Topic { topic } => write!(f, "{}", topic),
        }
    }
}

/// What gets stored under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    Record(Record),
    Placeholder(Placeholder),
}

impl Entry {
    /// The JSON document remote backends store.
    pub fn body(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::Record(record) => serde_json::to_value(record)?,
            Self::Placeholder(placeholder) => serde_json::to_value(placeholder)?,
        };
        Ok(value)
    }
}

/// An existence-check-then-create store keyed by [`LedgerKey`].
///
/// Backends only provide `exists` and `create`; the idempotent
/// operations are built on top of them. `create` on an occupied key must
/// either fail with [`LedgerError::AlreadyExists`] or be impossible
/// because `exists` was checked first with no concurrent writer.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    async fn exists(&self, key: &LedgerKey) -> Result<bool>;

    async fn create(&self, key: &LedgerKey, entry: &Entry) -> Result<()>;

    /// Records `item` under `topic` unless it is already there.
    ///
    /// Returns true iff a new record was created. The record's write
    /// timestamp is taken at creation time.
    async fn try_record(&self, topic: &str, item: &Item) -> Result<bool> {
        let key = LedgerKey::item(topic, &item.id);
        create_if_absent(self, &key, || {
            Entry::Record(Record::new(topic, item, Utc::now()))
        })
        .await
    }

    /// Writes the empty-topic placeholder unless it is already there.
    ///
    /// Returns true iff the placeholder was created by this call.
    async fn ensure_topic_exists(&self, topic: &str) -> Result<bool> {
        let key = LedgerKey::topic(topic);
        create_if_absent(self, &key, || Entry::Placeholder(Placeholder::new(topic, Utc::now())))
            .await
    }
}

async fn create_if_absent<L, F>(ledger: &L, key: &LedgerKey, entry: F) -> Result<bool>
where
    L: Ledger + ?Sized,
    F: FnOnce() -> Entry + Send,
{
    if ledger.exists(key).await? {
        debug!(ledger = ledger.name(), key = %key, "Already recorded");
        return Ok(false);
    }

    match ledger.create(key, &entry()).await {
        Ok(()) => Ok(true),
        Err(LedgerError::AlreadyExists(_)) => {
            debug!(ledger = ledger.name(), key = %key, "Lost create race, treating as recorded");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
