use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::DirectoryConfig;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Looks up wallets a platform user has verified.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Verified addresses for `numeric_id`, most relevant first. Empty when
    /// the user has none. Strings are unvalidated.
    async fn lookup_addresses(&self, numeric_id: u64) -> Result<Vec<String>, DirectoryError>;
}

#[derive(Debug, Deserialize)]
struct BulkUsersResponse {
    #[serde(default)]
    users: Vec<DirectoryUser>,
}

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    fid: u64,
    #[serde(default)]
    verified_addresses: VerifiedAddresses,
}

#[derive(Debug, Default, Deserialize)]
struct VerifiedAddresses {
    #[serde(default)]
    eth_addresses: Vec<String>,
}

/// Neynar-compatible Farcaster user directory.
pub struct NeynarDirectory {
    http_client: Client,
    api_url: String,
    api_key: String,
}

impl NeynarDirectory {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &DirectoryConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref()?;
        Some(Self::new(
            &config.api_url,
            api_key,
            Duration::from_millis(config.timeout_ms),
        ))
    }
}

#[async_trait]
impl IdentityDirectory for NeynarDirectory {
    async fn lookup_addresses(&self, numeric_id: u64) -> Result<Vec<String>, DirectoryError> {
        let url = format!("{}/v2/farcaster/user/bulk", self.api_url);
        debug!("🔍 Directory lookup for id {}", numeric_id);

        let resp = self
            .http_client
            .get(url)
            .query(&[("fids", numeric_id.to_string())])
            .header("x-api-key", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(DirectoryError::Status(resp.status()));
        }

        let data: BulkUsersResponse = resp.json().await?;
        Ok(data
            .users
            .into_iter()
            .filter(|user| user.fid == numeric_id)
            .flat_map(|user| user.verified_addresses.eth_addresses)
            .collect())
    }
}
