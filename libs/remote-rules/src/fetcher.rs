//! Document fetching
//!
//! `http://` and `https://` URLs go through a shared reqwest client with an
//! optional forward proxy per scheme. `file://` URLs are read from disk.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RemoteInfoError, Result};

/// Default fetch timeout (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("remote-rules/", env!("CARGO_PKG_VERSION"));

/// Retrieves the raw text of a remote document
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Forward proxy for `http://` URLs
    pub http_proxy: Option<String>,
    /// Forward proxy for `https://` URLs
    pub https_proxy: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_proxy: None,
            https_proxy: None,
        }
    }
}

/// Fetcher for `http`, `https` and `file` URLs
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    client: Client,
}

impl UrlFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone());

        if let Some(proxy) = non_empty(&settings.http_proxy) {
            builder = builder.proxy(Proxy::http(proxy).map_err(|e| {
                RemoteInfoError::Config(format!("invalid http_proxy '{}': {}", proxy, e))
            })?);
        }
        if let Some(proxy) = non_empty(&settings.https_proxy) {
            builder = builder.proxy(Proxy::https(proxy).map_err(|e| {
                RemoteInfoError::Config(format!("invalid https_proxy '{}': {}", proxy, e))
            })?);
        }

        let client = builder
            .build()
            .map_err(|e| RemoteInfoError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn fetch_http(&self, url: Url) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_file(&self, url: &Url) -> Result<String> {
        let path = url.to_file_path().map_err(|_| RemoteInfoError::Fetch {
            url: url.to_string(),
            reason: "not a local file path".to_string(),
        })?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RemoteInfoError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl DocumentFetcher for UrlFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| RemoteInfoError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!("Fetching {}", url);
        match parsed.scheme() {
            "http" | "https" => self.fetch_http(parsed).await,
            "file" => self.fetch_file(&parsed).await,
            scheme => Err(RemoteInfoError::Fetch {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", scheme),
            }),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
