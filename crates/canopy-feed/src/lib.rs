//! Canopy Feed - cursor-based feed sync
//!
//! The flat cousin of the tree sync: read every message newer than a
//! stored cursor, upsert each one by id, and advance the cursor after
//! each success. No recursion and no cycle guard, since a feed is
//! already a single ordered list.

mod error;
mod feed;
mod supabase;
mod telegram;

pub use error::{FeedError, Result};
pub use feed::{sync_feed, CursorStore, FeedMessage, FeedRun, FeedSink, FeedSource};
pub use supabase::{SupabaseConfig, SupabaseStore};
pub use telegram::{TelegramConfig, TelegramFeed, TELEGRAM_API_URL};
