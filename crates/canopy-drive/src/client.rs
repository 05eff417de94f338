//! Drive v3 REST listing client.

use crate::error::{DriveError, Result};
use crate::listing::{ListingService, Page};
use crate::query::ListQuery;
use async_trait::async_trait;
use canopy_core::{Item, ItemKind};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Public Drive v3 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

const FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, createdTime, modifiedTime)";

/// Settings for [`DriveClient`].
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// API key sent as the `key` query parameter.
    pub api_key: String,

    /// API root without trailing slash.
    pub base_url: String,

    /// Items per page (the API caps this at 1000).
    pub page_size: u32,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl DriveConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 1000,
            timeout: canopy_core::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Builder pattern: point at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder pattern: set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    size: Option<String>,
    created_time: Option<DateTime<Utc>>,
    modified_time: Option<DateTime<Utc>>,
}

impl From<DriveFile> for Item {
    fn from(file: DriveFile) -> Self {
        let kind = ItemKind::from_mime_type(&file.mime_type);
        let mut item = Item::new(file.id, file.name, kind, file.mime_type);
        item.size = file.size.and_then(|s| s.parse().ok());
        item.created_at = file.created_time;
        item.modified_at = file.modified_time;
        item
    }
}

/// Lists folders through the Drive v3 `files.list` endpoint using an
/// API key (public or link-shared folders).
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
}

impl DriveClient {
    /// Creates a client, rejecting an empty key or malformed base URL.
    pub fn new(config: DriveConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(DriveError::InvalidConfig("API key cannot be empty".into()));
        }

        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(DriveError::InvalidConfig(
                "base URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("canopy/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config: DriveConfig { base_url, ..config },
        })
    }
}

#[async_trait]
impl ListingService for DriveClient {
    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page> {
        let url = format!("{}/files", self.config.base_url);
        let filter = query.filter_expression();
        let page_size = self.config.page_size.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("q", filter.as_str()),
            ("key", self.config.api_key.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", FIELDS),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        debug!(folder = %query.parent, q = %filter, "Listing folder page");

        let response = self
            .http
            .get(&url)
            .query(&params)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DriveError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|e| DriveError::Parse(e.to_string()))?;

        Ok(Page {
            items: list.files.into_iter().map(Item::from).collect(),
            next_page_token: list.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let result = DriveClient::new(DriveConfig::new("  "));
        assert!(matches!(result, Err(DriveError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let result = DriveClient::new(DriveConfig::new("k").with_base_url("ftp://x"));
        assert!(matches!(result, Err(DriveError::InvalidConfig(_))));
    }

    #[test]
    fn test_wire_file_conversion() {
        let file: DriveFile = serde_json::from_str(
            r#"{
                "id": "abc",
                "name": "Sub",
                "mimeType": "application/vnd.google-apps.folder",
                "createdTime": "2024-02-01T10:00:00.000Z",
                "modifiedTime": "2024-02-03T10:00:00.000Z"
            }"#,
        )
        .unwrap();

        let item = Item::from(file);
        assert!(item.is_folder());
        assert_eq!(item.size, None);
        assert_eq!(
            item.modified_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-02-03T10:00:00+00:00")
        );
    }

    #[test]
    fn test_wire_file_without_times() {
        let file: DriveFile =
            serde_json::from_str(r#"{"id": "abc", "name": "a.pdf", "mimeType": "application/pdf"}"#)
                .unwrap();

        let item = Item::from(file);
        assert_eq!(item.created_at, None);
        assert_eq!(item.modified_at, None);
    }
}
