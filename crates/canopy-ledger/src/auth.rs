//! Service-account credentials and OAuth2 token exchange.
//!
//! The remote ledgers accept a short-lived access token. We get one by
//! signing a JWT bearer assertion with the service account's key and
//! trading it at the account's token endpoint.

use crate::error::{LedgerError, Result};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Scopes covering both the Realtime Database and Firestore.
pub const TOKEN_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase.database",
    "https://www.googleapis.com/auth/userinfo.email",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account key file we actually use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    pub project_id: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

// Keeps the private key out of logs.
impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Parses the key-file JSON blob.
    pub fn from_json(json: &str) -> Result<Self> {
        let account: Self = serde_json::from_str(json)
            .map_err(|e| LedgerError::Credentials(format!("malformed service account: {}", e)))?;

        if account.client_email.trim().is_empty() || account.private_key.trim().is_empty() {
            return Err(LedgerError::Credentials(
                "service account needs client_email and private_key".into(),
            ));
        }
        if account.project_id.trim().is_empty() {
            return Err(LedgerError::Credentials(
                "service account needs project_id".into(),
            ));
        }
        Ok(account)
    }

    /// Signs a one-hour bearer assertion for [`TOKEN_SCOPES`].
    fn assertion(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: String,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: TOKEN_SCOPES.join(" "),
            aud: &self.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| LedgerError::Credentials(format!("unusable private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| LedgerError::Credentials(format!("failed to sign assertion: {}", e)))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges the service account's signed assertion for an access token.
pub async fn fetch_access_token(
    http: &Client,
    account: &ServiceAccount,
    timeout: Duration,
) -> Result<String> {
    let assertion = account.assertion()?;
    debug!(email = %account.client_email, "Requesting access token");

    let response = http
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(LedgerError::Auth(format!("{}: {}", status.as_u16(), message)));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| LedgerError::Auth(format!("unexpected token response: {}", e)))?;

    info!(project = %account.project_id, "Obtained database access token");
    Ok(token.access_token)
}
