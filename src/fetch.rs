//! # fetch — Explorer page transport
//!
//! The extraction engine only needs `fetch(url) -> raw text`; this module
//! defines that port and the reqwest-backed implementation that poses as a
//! desktop browser (several explorers reject unknown user agents).

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SyncError;

/// Desktop Chrome user agent sent with every explorer request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, SyncError>;
}

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SyncError> {
        debug!(url, "GET explorer page");
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.text().await?)
    }
}

/// Turn a non-2xx response into the matching [`SyncError`], body included.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::from_status(status.as_u16(), body))
}
