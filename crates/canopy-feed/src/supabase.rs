//! Supabase (PostgREST) sink and cursor store.
//!
//! Messages land in a `tips` table keyed by id; the cursor lives in a
//! `metadata` key/value table under `last_tip_id`.

use crate::error::{FeedError, Result};
use crate::feed::{CursorStore, FeedMessage, FeedSink};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub table: String,
    pub metadata_table: String,
    pub cursor_key: String,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            table: "tips".to_string(),
            metadata_table: "metadata".to_string(),
            cursor_key: "last_tip_id".to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct MetadataRow {
    value: serde_json::Value,
}

pub struct SupabaseStore {
    http: Client,
    config: SupabaseConfig,
}

impl SupabaseStore {
    pub fn new(http: Client, mut config: SupabaseConfig) -> Result<Self> {
        config.url = config.url.trim().trim_end_matches('/').to_string();
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(FeedError::InvalidConfig(
                "Supabase URL must start with http:// or https://".into(),
            ));
        }
        if config.key.trim().is_empty() {
            return Err(FeedError::InvalidConfig("Supabase key is empty".into()));
        }
        Ok(Self { http, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url, table)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .timeout(self.config.timeout)
            .header("apikey", &self.config.key)
            .bearer_auth(&self.config.key)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(FeedError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

/// `2024-01-01 10:00:00+00:00`, the format the table already holds.
fn stored_date(message: &FeedMessage) -> String {
    message.date.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

#[async_trait]
impl FeedSink for SupabaseStore {
    async fn upsert(&self, message: &FeedMessage) -> Result<()> {
        let row = json!({
            "id": message.id,
            "text": message.text,
            "date": stored_date(message),
        });
        let response = self
            .request(self.http.post(self.table_url(&self.config.table)))
            .query(&[("on_conflict", "id")])
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&[row])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CursorStore for SupabaseStore {
    async fn load(&self) -> Result<i64> {
        let key_filter = format!("eq.{}", self.config.cursor_key);
        let response = self
            .request(self.http.get(self.table_url(&self.config.metadata_table)))
            .query(&[("select", "value"), ("key", key_filter.as_str())])
            .send()
            .await?;
        let rows: Vec<MetadataRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(0);
        };
        match &row.value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Null => Some(0),
            _ => None,
        }
        .ok_or_else(|| FeedError::Parse(format!("cursor value {} is not an id", row.value)))
    }

    async fn save(&self, cursor: i64) -> Result<()> {
        let row = json!({
            "key": self.config.cursor_key,
            "value": cursor.to_string(),
        });
        let response = self
            .request(self.http.post(self.table_url(&self.config.metadata_table)))
            .query(&[("on_conflict", "key")])
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&[row])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
