//! # prices — Price Resolution Pipeline
//!
//! ```text
//!  symbols ──▶ SymbolCache (resolve / discover) ──▶ provider IDs
//!                                                      │
//!            ┌─────────── chunks of `batch_size` ──────┘
//!            ▼
//!   /simple/price?ids=a,b,c  ── retry 30s·n (429) / 10s·n (network) / 5s·n
//!            │ exhausted
//!            ▼
//!   one request per symbol  ── retry 30s·n / 5s·n / 3s·n, budget 2
//! ```
//!
//! Unresolvable symbols and symbols without price data are reported in
//! [`PriceResolution`] — never errors, never both listed and priced.

pub mod coingecko;
pub mod symbols;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::retry::RetryPolicy;

pub use coingecko::CoinGeckoClient;
pub use symbols::{JsonFileStore, MappingStore, SymbolCache};

// ─── Price API Port ───────────────────────────────────────────────────────────

/// One search result from the price provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinHit {
    pub id:     String,
    pub symbol: String,
    #[serde(default)]
    pub name:   String,
}

/// `{ provider_id: { currency: price } }`
pub type PriceTable = HashMap<String, HashMap<String, f64>>;

/// Detail record for one coin (`/coins/{id}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinMarketData {
    pub id:              String,
    pub symbol:          String,
    #[serde(default)]
    pub name:            String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub market_data:     MarketData,
}

/// Per-currency market figures, keyed by lowercase currency code.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub current_price:               HashMap<String, f64>,
    #[serde(default)]
    pub market_cap:                  HashMap<String, f64>,
    #[serde(default)]
    pub total_volume:                HashMap<String, f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

impl CoinMarketData {
    pub fn price_in(&self, currency: &str) -> Option<f64> {
        self.market_data.current_price.get(&currency.to_lowercase()).copied()
    }
}

/// One entry of the provider's trending list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrendingCoin {
    pub id:              String,
    pub symbol:          String,
    #[serde(default)]
    pub name:            String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    /// Position in the list, 0 = hottest.
    #[serde(default)]
    pub score:           Option<u32>,
}

#[async_trait]
pub trait PriceApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<CoinHit>, SyncError>;
    async fn simple_prices(&self, ids: &[String], currency: &str) -> Result<PriceTable, SyncError>;
    async fn market_data(&self, id: &str) -> Result<CoinMarketData, SyncError>;
    async fn trending(&self) -> Result<Vec<TrendingCoin>, SyncError>;
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PriceConfig {
    /// Quote currency, lowercase as the API expects (`"usd"`).
    pub currency:         String,
    /// IDs per combined request.
    pub batch_size:       usize,
    /// Pause between combined requests.
    pub batch_delay:      Duration,
    /// Attempts per combined request, and per standalone single lookup.
    pub max_retries:      u32,
    /// Attempts per symbol when a whole batch has failed.
    pub fallback_retries: u32,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            currency:         "usd".to_string(),
            batch_size:       50,
            batch_delay:      Duration::from_secs(3),
            max_retries:      3,
            fallback_retries: 2,
        }
    }
}

// ─── Result ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceResolution {
    /// Uppercase symbol → price.
    pub prices:     BTreeMap<String, f64>,
    /// No known or discoverable provider ID.
    pub unresolved: Vec<String>,
    /// Resolved, but no price came back.
    pub missing:    Vec<String>,
}

impl PriceResolution {
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

pub struct PriceResolver {
    api:    Arc<dyn PriceApi>,
    config: PriceConfig,
}

impl PriceResolver {
    pub fn new(api: Arc<dyn PriceApi>, mut config: PriceConfig) -> Self {
        config.currency = config.currency.to_lowercase();
        config.batch_size = config.batch_size.max(1);
        Self { api, config }
    }

    /// Resolve every symbol in `symbols` to a current price.
    ///
    /// Symbols are trimmed and uppercased; blanks are ignored. Partial
    /// results are normal.
    pub async fn resolve_prices<I, S>(&self, cache: &mut SymbolCache, symbols: I) -> PriceResolution
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: BTreeSet<String> = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let mut result = PriceResolution::default();
        if wanted.is_empty() {
            return result;
        }

        // ── 1. Symbol → provider ID ───────────────────────────────────────────
        let mut resolved: Vec<(String, String)> = Vec::with_capacity(wanted.len());
        for symbol in &wanted {
            match cache.resolve_or_discover(symbol, self.api.as_ref()).await {
                Some(id) => resolved.push((symbol.clone(), id)),
                None => {
                    warn!(symbol = %symbol, "No price-provider ID — skipping");
                    result.unresolved.push(symbol.clone());
                }
            }
        }

        if resolved.is_empty() {
            warn!(requested = wanted.len(), "No symbol could be resolved");
            return result;
        }

        // ── 2. Batched lookups ────────────────────────────────────────────────
        let batch_policy = RetryPolicy::price_batch(self.config.max_retries);
        let fallback_policy = RetryPolicy::price_single(self.config.fallback_retries);
        let batch_count = resolved.len().div_ceil(self.config.batch_size);

        for (index, batch) in resolved.chunks(self.config.batch_size).enumerate() {
            if index > 0 {
                debug!(delay = ?self.config.batch_delay, "Waiting before next price batch");
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let ids: Vec<String> = batch.iter().map(|(_, id)| id.clone()).collect();
            let currency = self.config.currency.as_str();

            match batch_policy
                .run("price batch", |_| self.api.simple_prices(&ids, currency))
                .await
            {
                Ok(table) => {
                    for (symbol, id) in batch {
                        match lookup(&table, id, currency) {
                            Some(price) => {
                                result.prices.insert(symbol.clone(), price);
                            }
                            None => {
                                warn!(symbol = %symbol, id = %id, "No price data returned");
                                result.missing.push(symbol.clone());
                            }
                        }
                    }
                    info!(batch = index + 1, of = batch_count, size = batch.len(), "✅ Price batch done");
                }
                Err(e) => {
                    warn!(
                        batch = index + 1,
                        error = %e,
                        "Price batch failed — falling back to single lookups"
                    );
                    for (symbol, id) in batch {
                        match self.fetch_single(symbol, id, &fallback_policy).await {
                            Some(price) => {
                                result.prices.insert(symbol.clone(), price);
                            }
                            None => result.missing.push(symbol.clone()),
                        }
                    }
                }
            }
        }

        info!(
            priced     = result.prices.len(),
            requested  = wanted.len(),
            unresolved = result.unresolved.len(),
            missing    = result.missing.len(),
            "Price lookup complete"
        );
        result
    }

    /// Price for one symbol, discovering its ID if needed.
    pub async fn resolve_single_price(&self, cache: &mut SymbolCache, symbol: &str) -> Option<f64> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return None;
        }

        let Some(id) = cache.resolve_or_discover(&symbol, self.api.as_ref()).await else {
            warn!(symbol = %symbol, "No price-provider ID");
            return None;
        };

        let policy = RetryPolicy::price_single(self.config.max_retries);
        self.fetch_single(&symbol, &id, &policy).await
    }

    /// Market detail for one symbol, discovering its ID if needed.
    pub async fn market_data(&self, cache: &mut SymbolCache, symbol: &str) -> Option<CoinMarketData> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return None;
        }

        let Some(id) = cache.resolve_or_discover(&symbol, self.api.as_ref()).await else {
            warn!(symbol = %symbol, "No price-provider ID");
            return None;
        };

        let policy = RetryPolicy::price_single(self.config.max_retries);
        match policy.run("market data", |_| self.api.market_data(&id)).await {
            Ok(data) => {
                debug!(symbol = %symbol, id = %id, rank = ?data.market_cap_rank, "Market data fetched");
                Some(data)
            }
            Err(e) => {
                warn!(symbol = %symbol, id = %id, error = %e, "Market data lookup failed");
                None
            }
        }
    }

    /// The provider's trending coins; empty when the call fails.
    pub async fn trending(&self) -> Vec<TrendingCoin> {
        let policy = RetryPolicy::price_single(self.config.max_retries);
        match policy.run("trending coins", |_| self.api.trending()).await {
            Ok(coins) => {
                info!(count = coins.len(), "📈 Trending coins fetched");
                coins
            }
            Err(e) => {
                warn!(error = %e, "Trending lookup failed");
                Vec::new()
            }
        }
    }

    async fn fetch_single(&self, symbol: &str, id: &str, policy: &RetryPolicy) -> Option<f64> {
        let ids = [id.to_string()];
        let currency = self.config.currency.as_str();

        match policy
            .run("single price", |_| self.api.simple_prices(&ids, currency))
            .await
        {
            Ok(table) => {
                let price = lookup(&table, id, currency);
                if price.is_none() {
                    warn!(symbol, id, "No price data returned");
                }
                price
            }
            Err(e) => {
                warn!(symbol, id, error = %e, "Single price lookup failed");
                None
            }
        }
    }
}

fn lookup(table: &PriceTable, id: &str, currency: &str) -> Option<f64> {
    table.get(id).and_then(|quotes| quotes.get(currency)).copied()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
