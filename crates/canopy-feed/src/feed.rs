//! Feed contracts and the sync loop.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One message of a linear feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    /// Monotonic id within the feed.
    pub id: i64,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
}

impl FeedMessage {
    fn has_text(&self) -> bool {
        self.text.as_deref().map_or(false, |t| !t.trim().is_empty())
    }
}

/// Where messages come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Messages with an id strictly greater than `cursor`.
    async fn messages_since(&self, cursor: i64) -> Result<Vec<FeedMessage>>;

    /// Called once the cursor is durably saved at `cursor`. Sources that
    /// discard delivered messages may do so here, never earlier.
    async fn ack(&self, _cursor: i64) -> Result<()> {
        Ok(())
    }
}

/// Where messages go. Upserting the same id twice must not duplicate.
#[async_trait]
pub trait FeedSink: Send + Sync {
    async fn upsert(&self, message: &FeedMessage) -> Result<()>;
}

/// The single "last processed id" row.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The stored cursor, 0 when none was ever saved.
    async fn load(&self) -> Result<i64>;

    async fn save(&self, cursor: i64) -> Result<()>;
}

/// Summary of one feed pass.
#[derive(Debug, Clone)]
pub struct FeedRun {
    pub cursor_before: i64,
    pub cursor_after: i64,

    /// Messages upserted.
    pub stored: usize,

    /// Messages without text, passed over.
    pub skipped: usize,

    /// Set when the pass stopped early; the cursor stays on the last
    /// message that was fully handled.
    pub stopped_by: Option<String>,

    pub elapsed: Duration,
}

/// Runs one feed pass.
///
/// Loading the cursor and fetching messages are the only failures that
/// abort the pass. A failed upsert or cursor write stops it, leaving the
/// cursor where the next pass should resume.
pub async fn sync_feed(
    source: &dyn FeedSource,
    sink: &dyn FeedSink,
    cursor: &dyn CursorStore,
) -> Result<FeedRun> {
    let started = Instant::now();
    let cursor_before = cursor.load().await?;
    info!(cursor = cursor_before, "Starting feed sync");

    let mut messages = source.messages_since(cursor_before).await?;
    messages.retain(|m| m.id > cursor_before);
    messages.sort_by_key(|m| m.id);
    messages.dedup_by_key(|m| m.id);

    let mut current = cursor_before;
    let mut stored = 0;
    let mut skipped = 0;
    let mut stopped_by = None;

    for message in &messages {
        if message.has_text() {
            if let Err(e) = sink.upsert(message).await {
                warn!(id = message.id, "Failed to store message: {}", e);
                stopped_by = Some(e.to_string());
                break;
            }
            info!(id = message.id, "Stored message");
            stored += 1;
        } else {
            debug!(id = message.id, "No text, skipping");
            skipped += 1;
        }

        if let Err(e) = cursor.save(message.id).await {
            warn!(id = message.id, "Failed to advance cursor: {}", e);
            stopped_by = Some(e.to_string());
            break;
        }
        current = message.id;
    }

    // A failed ack only means the next pass reads the same window again;
    // the cursor filters out what was already handled.
    if let Err(e) = source.ack(current).await {
        warn!(cursor = current, "Failed to acknowledge feed position: {}", e);
    }

    let elapsed = started.elapsed();
    info!(stored, skipped, cursor = current, "Feed sync finished in {:?}", elapsed);

    Ok(FeedRun {
        cursor_before,
        cursor_after: current,
        stored,
        skipped,
        stopped_by,
        elapsed,
    })
}
