//! # prices::symbols — Symbol Resolution Cache
//!
//! Ticker ⇄ CoinGecko ID mapping that grows itself.
//!
//! ## Lifecycle
//! 1. Seeded from [`DEFAULT_SYMBOL_IDS`] at start-up
//! 2. Merged with whatever the [`MappingStore`] holds (failures keep defaults)
//! 3. On a lookup miss, [`SymbolCache::discover`] asks the price API's search
//!    endpoint, inserts the winner and persists the **whole** table
//!
//! The cache is owned by the caller and handed to the price pipeline as
//! `&mut`, so every mutation and its persistence write are serialized.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::prices::PriceApi;

/// Built-in ticker → CoinGecko ID table.
pub const DEFAULT_SYMBOL_IDS: &[(&str, &str)] = &[
    ("AVAX", "avalanche-2"),        ("BTC", "bitcoin"),
    ("ETH", "ethereum"),            ("USDC", "usd-coin"),
    ("USDT", "tether"),             ("SOL", "solana"),
    ("MATIC", "matic-network"),     ("LINK", "chainlink"),
    ("UNI", "uniswap"),             ("AAVE", "aave"),
    ("CRV", "curve-dao-token"),     ("COMP", "compound-governance-token"),
    ("MKR", "maker"),               ("SNX", "havven"),
    ("YFI", "yearn-finance"),       ("SUSHI", "sushi"),
    ("1INCH", "1inch"),             ("BAL", "balancer"),
    ("REN", "republic-protocol"),   ("KNC", "kyber-network-crystal"),
    ("ZRX", "0x"),                  ("BAND", "band-protocol"),
    ("UMA", "uma"),                 ("BADGER", "badger-dao"),
    ("ALPHA", "alpha-finance-lab"), ("PERP", "perpetual-protocol"),
    ("RARI", "rarible"),            ("MASK", "mask-network"),
    ("ENS", "ethereum-name-service"), ("OP", "optimism"),
    ("ARB", "arbitrum"),            ("PEPE", "pepe"),
    ("SHIB", "shiba-inu"),          ("DOGE", "dogecoin"),
    ("ADA", "cardano"),             ("DOT", "polkadot"),
    ("LTC", "litecoin"),            ("BCH", "bitcoin-cash"),
    ("XRP", "ripple"),              ("TRX", "tron"),
    ("EOS", "eos"),                 ("XLM", "stellar"),
    ("VET", "vechain"),             ("THETA", "theta-token"),
    ("FIL", "filecoin"),            ("ICP", "internet-computer"),
    ("NEAR", "near"),               ("FTM", "fantom"),
    ("ALGO", "algorand"),           ("ATOM", "cosmos"),
    ("XTZ", "tezos"),               ("DASH", "dash"),
    ("ZEC", "zcash"),               ("XMR", "monero"),
    ("NEO", "neo"),                 ("IOTA", "iota"),
    ("WAVES", "waves"),             ("HBAR", "hedera-hashgraph"),
    ("MANA", "decentraland"),       ("SAND", "the-sandbox"),
    ("AXS", "axie-infinity"),       ("CHZ", "chiliz"),
    ("HOT", "holochain"),           ("ENJ", "enjincoin"),
    ("GALA", "gala"),               ("ROSE", "oasis-network"),
    ("ONE", "harmony"),             ("IOTX", "iotex"),
    ("ANKR", "ankr"),               ("COTI", "coti"),
    ("OCEAN", "ocean-protocol"),    ("DYDX", "dydx"),
    ("IMX", "immutable-x"),         ("GODS", "gods-unchained"),
    ("ILV", "illuvium"),            ("RNDR", "render-token"),
    ("HIVE", "hive"),               ("STEEM", "steem"),
    ("HBD", "hive-dollar"),         ("TON", "the-open-network"),
    ("POPCAT", "popcat"),           ("KAITO", "kaito"),
    ("BNB", "binancecoin"),         ("BUSD", "binance-usd"),
    ("DAI", "dai"),                 ("WBTC", "wrapped-bitcoin"),
    ("WETH", "weth"),               ("CAKE", "pancakeswap-token"),
    ("APT", "aptos"),               ("SUI", "sui"),
    ("INJ", "injective-protocol"),  ("TIA", "celestia"),
    ("PYTH", "pyth-network"),       ("JUP", "jupiter"),
    ("BONK", "bonk"),               ("WIF", "dogwifhat"),
    ("FLOKI", "floki"),             ("BOOK", "book-of-meme"),
    ("MYRO", "myro"),
];

// ─── Persistence Port ─────────────────────────────────────────────────────────

/// Durable storage for the ticker → ID table. Always written wholesale.
pub trait MappingStore: Send + Sync {
    fn load(&self) -> Result<BTreeMap<String, String>, SyncError>;
    fn save(&self, mapping: &BTreeMap<String, String>) -> Result<(), SyncError>;
}

/// Pretty-printed JSON object on disk: `{ "BTC": "bitcoin", … }`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MappingStore for JsonFileStore {
    fn load(&self) -> Result<BTreeMap<String, String>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            // First run: nothing discovered yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, mapping: &BTreeMap<String, String>) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(mapping)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

// ─── SymbolCache ──────────────────────────────────────────────────────────────

pub struct SymbolCache {
    by_symbol: BTreeMap<String, String>,
    by_id:     HashMap<String, String>,
    store:     Box<dyn MappingStore>,
}

impl SymbolCache {
    /// Built-in table only; the store is used for writes but not read.
    pub fn with_defaults(store: Box<dyn MappingStore>) -> Self {
        let by_symbol: BTreeMap<String, String> = DEFAULT_SYMBOL_IDS
            .iter()
            .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
            .collect();
        let mut cache = Self { by_symbol, by_id: HashMap::new(), store };
        cache.rebuild_reverse();
        cache
    }

    /// Built-in table with the persisted mapping merged over it.
    pub fn load(store: Box<dyn MappingStore>) -> Self {
        let mut cache = Self::with_defaults(store);
        match cache.store.load() {
            Ok(saved) => {
                let count = saved.len();
                for (symbol, id) in saved {
                    cache.by_symbol.insert(symbol.trim().to_uppercase(), id);
                }
                cache.rebuild_reverse();
                info!(loaded = count, total = cache.len(), "Symbol mapping loaded");
            }
            Err(e) => {
                warn!(error = %e, "Could not load symbol mapping — keeping built-in defaults");
            }
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Case-insensitive exact lookup.
    pub fn resolve(&self, symbol: &str) -> Option<&str> {
        self.by_symbol
            .get(&symbol.trim().to_uppercase())
            .map(String::as_str)
    }

    pub fn symbol_for(&self, provider_id: &str) -> Option<&str> {
        self.by_id.get(provider_id).map(String::as_str)
    }

    /// Insert or overwrite a mapping and persist the full table.
    ///
    /// Last write wins on collisions: the ID's reverse entry is repointed and
    /// the symbol's previous ID loses its reverse entry.
    pub fn insert(&mut self, symbol: &str, provider_id: &str) {
        let symbol = symbol.trim().to_uppercase();
        if let Some(previous) = self.by_symbol.insert(symbol.clone(), provider_id.to_string()) {
            if previous != provider_id && self.by_id.get(&previous) == Some(&symbol) {
                self.by_id.remove(&previous);
            }
        }
        self.by_id.insert(provider_id.to_string(), symbol.clone());
        info!(symbol = %symbol, provider_id, "Symbol mapping added");
        self.persist();
    }

    /// Ask the search endpoint for `symbol` and remember the best hit.
    ///
    /// An exact (case-insensitive) ticker match wins; otherwise the first
    /// result is taken. Search failures are logged and yield `None`.
    pub async fn discover(&mut self, symbol: &str, api: &dyn PriceApi) -> Option<String> {
        let query = symbol.trim();
        if query.is_empty() {
            return None;
        }

        let hits = match api.search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(symbol = %query, error = %e, "Symbol search failed");
                return None;
            }
        };

        let exact = hits.iter().find(|hit| hit.symbol.eq_ignore_ascii_case(query));
        let hit = match exact.or_else(|| hits.first()) {
            Some(hit) => hit,
            None => {
                debug!(symbol = %query, "Symbol search returned nothing");
                return None;
            }
        };

        info!(
            symbol   = %query,
            id       = %hit.id,
            name     = %hit.name,
            exact    = exact.is_some(),
            "🔎 Discovered price-provider ID"
        );

        let id = hit.id.clone();
        self.insert(query, &id);
        Some(id)
    }

    /// Cache hit, or discovery on miss.
    pub async fn resolve_or_discover(&mut self, symbol: &str, api: &dyn PriceApi) -> Option<String> {
        if let Some(id) = self.resolve(symbol) {
            return Some(id.to_string());
        }
        debug!(symbol, "No cached ID — searching");
        self.discover(symbol, api).await
    }

    fn rebuild_reverse(&mut self) {
        self.by_id = self
            .by_symbol
            .iter()
            .map(|(symbol, id)| (id.clone(), symbol.clone()))
            .collect();
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.by_symbol) {
            warn!(error = %e, "Failed to persist symbol mapping");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
