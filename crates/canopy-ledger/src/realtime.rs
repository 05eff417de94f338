//! Realtime Database ledger (REST).
//!
//! Layout: records at `updates/{topic}/{itemId}`, placeholders at
//! `placeholders/{topic}`. Creates are conditional on the location
//! still being empty, using the database's ETag support.

use crate::error::{LedgerError, Result};
use crate::ledger::{Entry, Ledger, LedgerKey};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";

pub struct RealtimeLedger {
    http: Client,
    base_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl RealtimeLedger {
    /// Creates a ledger for the database at `database_url`.
    pub fn new(
        http: Client,
        database_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = database_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(LedgerError::InvalidConfig(
                "database URL must start with http:// or https://".into(),
            ));
        }

        Ok(Self {
            http,
            base_url,
            access_token,
            timeout,
        })
    }

    fn path(key: &LedgerKey) -> String {
        match key {
            LedgerKey::Item { topic, id } => format!("updates/{}/{}", topic, id),
            LedgerKey::Topic { topic } => format!("placeholders/{}", topic),
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.access_token {
            Some(token) => builder.query(&[("access_token", token.as_str())]),
            None => builder,
        }
    }

    fn url(&self, key: &LedgerKey) -> String {
        format!("{}/{}.json", self.base_url, Self::path(key))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(LedgerError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Ledger for RealtimeLedger {
    fn name(&self) -> &str {
        "realtime"
    }

    async fn exists(&self, key: &LedgerKey) -> Result<bool> {
        let response = self.request(self.http.get(self.url(key))).send().await?;
        let value: serde_json::Value = Self::check(response).await?.json().await?;
        Ok(!value.is_null())
    }

    async fn create(&self, key: &LedgerKey, entry: &Entry) -> Result<()> {
        let url = self.url(key);

        // Fetch the location's ETag so the write only lands if it is
        // still empty when it arrives.
        let response = self
            .request(self.http.get(&url))
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let response = Self::check(response).await?;
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let current: serde_json::Value = response.json().await?;
        if !current.is_null() {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }

        let mut put = self.request(self.http.put(&url)).json(&entry.body()?);
        if let Some(etag) = etag {
            put = put.header(reqwest::header::IF_MATCH, etag);
        }

        let response = put.send().await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Err(LedgerError::AlreadyExists(key.to_string()));
        }
        Self::check(response).await?;

        debug!(key = %key, "Realtime database entry created");
        Ok(())
    }
}
