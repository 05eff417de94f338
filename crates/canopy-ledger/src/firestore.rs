//! Firestore ledger (REST).
//!
//! Layout: records are documents `updates/{topic}/files/{itemId}`; the
//! placeholder for an empty topic is the topic document `updates/{topic}`.
//! Documents are created with an explicit id, which the API refuses with
//! 409 when the document already exists.

use crate::error::{LedgerError, Result};
use crate::ledger::{Entry, Ledger, LedgerKey};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Public Firestore v1 endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

pub struct FirestoreLedger {
    http: Client,
    documents_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl FirestoreLedger {
    /// Creates a ledger over the default database of `project_id`.
    pub fn new(
        http: Client,
        base_url: &str,
        project_id: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(LedgerError::InvalidConfig(
                "Firestore URL must start with http:// or https://".into(),
            ));
        }
        if project_id.trim().is_empty() {
            return Err(LedgerError::InvalidConfig("project id cannot be empty".into()));
        }

        Ok(Self {
            http,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base_url,
                project_id.trim()
            ),
            access_token,
            timeout,
        })
    }

    /// Splits a key into (collection path, document id).
    fn location(key: &LedgerKey) -> (String, &str) {
        match key {
            LedgerKey::Item { topic, id } => (format!("updates/{}/files", topic), id),
            LedgerKey::Topic { topic } => ("updates".to_string(), topic),
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Encodes a plain JSON value as a Firestore typed value.
fn typed_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(typed_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": typed_fields(map) } }),
    }
}

fn typed_fields(map: &Map<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), typed_value(v)))
            .collect(),
    )
}

/// Wraps an entry body as a Firestore document.
fn document(entry: &Entry) -> Result<Value> {
    match entry.body()? {
        Value::Object(map) => Ok(json!({ "fields": typed_fields(&map) })),
        other => Ok(json!({ "fields": { "value": typed_value(&other) } })),
    }
}

#[async_trait]
impl Ledger for FirestoreLedger {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn exists(&self, key: &LedgerKey) -> Result<bool> {
        let (collection, id) = Self::location(key);
        let url = format!("{}/{}/{}", self.documents_url, collection, id);

        let response = self.request(self.http.get(&url)).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(LedgerError::Server {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }

    async fn create(&self, key: &LedgerKey, entry: &Entry) -> Result<()> {
        let (collection, id) = Self::location(key);
        let url = format!("{}/{}", self.documents_url, collection);

        let response = self
            .request(self.http.post(&url))
            .query(&[("documentId", id)])
            .json(&document(entry)?)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                debug!(key = %key, "Firestore document created");
                Ok(())
            }
            StatusCode::CONFLICT => Err(LedgerError::AlreadyExists(key.to_string())),
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(LedgerError::Server {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }
}
