//! # prices::coingecko — CoinGecko REST v3 adapter
//!
//! - Public API: no key, tight limits (the pipeline's backoff exists for this)
//! - Demo API: `CG-…` key in `x-cg-demo-api-key`
//! - Pro API: any other key in `x-cg-pro-api-key`, separate host

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::SyncError;
use crate::fetch::ensure_success;
use crate::prices::{CoinHit, CoinMarketData, PriceApi, PriceTable, TrendingCoin};

/// Public and demo API host.
pub const PUBLIC_BASE_URL: &str = "https://api.coingecko.com/api/v3";
/// Pro API host.
pub const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// Host matching the kind of key supplied.
pub fn default_base_url(api_key: Option<&str>) -> &'static str {
    match api_key {
        Some(key) if !key.starts_with("CG-") => PRO_BASE_URL,
        _ => PUBLIC_BASE_URL,
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<CoinHit>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingCoin,
}

/// `/coins/{id}` trimmed to the market block.
const MARKET_DATA_QUERY: [(&str, &str); 6] = [
    ("localization", "false"),
    ("tickers", "false"),
    ("market_data", "true"),
    ("community_data", "false"),
    ("developer_data", "false"),
    ("sparkline", "false"),
];

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client:   reqwest::Client,
    base_url: String,
    api_key:  Option<String>,
}

impl CoinGeckoClient {
    /// `base_url = None` picks the host from the key type.
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {e}")))?;

        let base_url = base_url
            .unwrap_or_else(|| default_base_url(api_key.as_deref()).to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { client, base_url, api_key })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("Accept", "application/json");

        match self.api_key.as_deref() {
            Some(key) if key.starts_with("CG-") => request.header("x-cg-demo-api-key", key),
            Some(key) => request.header("x-cg-pro-api-key", key),
            None => request,
        }
    }
}

#[async_trait]
impl PriceApi for CoinGeckoClient {
    async fn search(&self, query: &str) -> Result<Vec<CoinHit>, SyncError> {
        debug!(query, "CoinGecko search");
        let response = self.get("/search").query(&[("query", query)]).send().await?;
        let body: SearchResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("CoinGecko search response: {e}")))?;
        Ok(body.coins)
    }

    async fn simple_prices(&self, ids: &[String], currency: &str) -> Result<PriceTable, SyncError> {
        debug!(count = ids.len(), currency, "CoinGecko simple/price");
        let response = self
            .get("/simple/price")
            .query(&[("ids", ids.join(",")), ("vs_currencies", currency.to_lowercase())])
            .send()
            .await?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("CoinGecko price response: {e}")))
    }

    async fn market_data(&self, id: &str) -> Result<CoinMarketData, SyncError> {
        debug!(id, "CoinGecko coin detail");
        let response = self
            .get(&format!("/coins/{id}"))
            .query(&MARKET_DATA_QUERY)
            .send()
            .await?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("CoinGecko market data response: {e}")))
    }

    async fn trending(&self) -> Result<Vec<TrendingCoin>, SyncError> {
        debug!("CoinGecko search/trending");
        let response = self.get("/search/trending").send().await?;
        let body: TrendingResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("CoinGecko trending response: {e}")))?;
        Ok(body.coins.into_iter().map(|entry| entry.item).collect())
    }
}
