//! Telegram channel source via the Bot API.
//!
//! `getUpdates` drops every update below the `offset` it is called with,
//! so a read never passes an offset. Only the pending window (up to
//! 100 updates) is read per pass, and [`FeedSource::ack`]
//! confirms the part of it the cursor has moved past. The next pass
//! then sees the following window.

use crate::error::{FeedError, Result};
use crate::feed::{FeedMessage, FeedSource};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Default Bot API endpoint.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Upper bound the Bot API allows per `getUpdates` call.
const UPDATES_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,

    /// Channel username (with or without `@`) or numeric chat id.
    pub channel: String,

    pub base_url: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            channel: channel.into(),
            base_url: TELEGRAM_API_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    channel_post: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    message_id: i64,
    date: i64,
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
    username: Option<String>,
}

/// An update read in the current window.
#[derive(Debug, Clone, Copy)]
struct Pending {
    update_id: i64,

    /// Set for posts in our channel; other updates need no handling.
    message_id: Option<i64>,
}

pub struct TelegramFeed {
    http: Client,
    config: TelegramConfig,
    window: Mutex<Vec<Pending>>,
}

impl TelegramFeed {
    pub fn new(http: Client, mut config: TelegramConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(FeedError::InvalidConfig("bot token is empty".into()));
        }
        config.channel = config.channel.trim().trim_start_matches('@').to_string();
        if config.channel.is_empty() {
            return Err(FeedError::InvalidConfig("channel is empty".into()));
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            config,
            window: Mutex::new(Vec::new()),
        })
    }

    fn is_our_channel(&self, chat: &Chat) -> bool {
        chat.id.to_string() == self.config.channel
            || chat
                .username
                .as_deref()
                .map_or(false, |u| u.eq_ignore_ascii_case(&self.config.channel))
    }

    fn window(&self) -> MutexGuard<'_, Vec<Pending>> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn updates(&self, offset: Option<i64>, limit: usize) -> Result<Vec<Update>> {
        let url = format!(
            "{}/bot{}/getUpdates",
            self.config.base_url, self.config.bot_token
        );
        let mut params = vec![
            ("allowed_updates", r#"["channel_post"]"#.to_string()),
            ("limit", limit.to_string()),
            ("timeout", "0".to_string()),
        ];
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }

        let response = self
            .http
            .get(url)
            .query(&params)
            .timeout(self.config.timeout)
            .send()
            .await?;
        let status = response.status();
        let body: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        if !status.is_success() || !body.ok {
            return Err(FeedError::Server {
                status: status.as_u16(),
                message: body.description.unwrap_or_default(),
            });
        }
        Ok(body.result.unwrap_or_default())
    }
}

#[async_trait]
impl FeedSource for TelegramFeed {
    async fn messages_since(&self, cursor: i64) -> Result<Vec<FeedMessage>> {
        let updates = self.updates(None, UPDATES_LIMIT).await?;
        debug!(count = updates.len(), "Fetched pending updates");

        let mut pending = Vec::with_capacity(updates.len());
        let mut messages = Vec::new();

        for update in updates {
            let post = update
                .channel_post
                .filter(|post| self.is_our_channel(&post.chat));
            pending.push(Pending {
                update_id: update.update_id,
                message_id: post.as_ref().map(|p| p.message_id),
            });

            let Some(post) = post else {
                continue;
            };
            if post.message_id <= cursor {
                continue;
            }
            let date = Utc
                .timestamp_opt(post.date, 0)
                .single()
                .ok_or_else(|| FeedError::Parse(format!("bad date {}", post.date)))?;
            messages.push(FeedMessage {
                id: post.message_id,
                text: post.text.or(post.caption),
                date,
            });
        }

        pending.sort_by_key(|p| p.update_id);
        *self.window() = pending;
        Ok(messages)
    }

    async fn ack(&self, cursor: i64) -> Result<()> {
        // Confirm the leading run of the window the cursor covers; the
        // first unhandled post and everything after it stay pending.
        let last = self
            .window()
            .iter()
            .take_while(|p| p.message_id.map_or(true, |id| id <= cursor))
            .map(|p| p.update_id)
            .last();

        let Some(last) = last else {
            return Ok(());
        };
        self.updates(Some(last + 1), 1).await?;
        self.window().retain(|p| p.update_id > last);

        info!(cursor, update_id = last, "Confirmed handled updates");
        Ok(())
    }
}
