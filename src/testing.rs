//! In-memory stand-ins for the crate's ports, shared by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::SyncError;
use crate::fetch::PageFetcher;
use crate::models::{column_index, CellUpdate};
use crate::prices::{CoinHit, CoinMarketData, MappingStore, PriceApi, PriceTable, TrendingCoin};
use crate::sheets::SheetsApi;

// ─── Price API ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePriceApi {
    prices:           HashMap<String, f64>,
    search:           HashMap<String, Vec<CoinHit>>,
    search_fails:     bool,
    rate_limit_multi: bool,
    fail_next:        Mutex<u32>,
    fail_status:      Option<u16>,
    market:           HashMap<String, CoinMarketData>,
    trending:         Vec<TrendingCoin>,
    price_calls:      Mutex<Vec<Vec<String>>>,
    search_calls:     Mutex<u32>,
    market_calls:     Mutex<Vec<String>>,
}

impl FakePriceApi {
    pub fn with_price(mut self, id: &str, price: f64) -> Self {
        self.prices.insert(id.to_string(), price);
        self
    }

    pub fn with_search(mut self, query: &str, hits: Vec<CoinHit>) -> Self {
        self.search.insert(query.to_uppercase(), hits);
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.search_fails = true;
        self
    }

    /// Any request naming more than one ID gets a 429.
    pub fn rate_limit_multi_id_requests(mut self) -> Self {
        self.rate_limit_multi = true;
        self
    }

    pub fn fail_next_price_calls(self, n: u32) -> Self {
        *self.fail_next.lock().unwrap() = n;
        self
    }

    /// Like [`Self::fail_next_price_calls`], but with an HTTP status error.
    pub fn fail_next_price_calls_with_status(mut self, n: u32, status: u16) -> Self {
        self.fail_status = Some(status);
        self.fail_next_price_calls(n)
    }

    pub fn with_market_data(mut self, data: CoinMarketData) -> Self {
        self.market.insert(data.id.clone(), data);
        self
    }

    pub fn with_trending(mut self, coins: Vec<TrendingCoin>) -> Self {
        self.trending = coins;
        self
    }

    pub fn market_calls(&self) -> Vec<String> {
        self.market_calls.lock().unwrap().clone()
    }

    pub fn price_calls(&self) -> Vec<Vec<String>> {
        self.price_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> u32 {
        *self.search_calls.lock().unwrap()
    }
}

#[async_trait]
impl PriceApi for FakePriceApi {
    async fn search(&self, query: &str) -> Result<Vec<CoinHit>, SyncError> {
        *self.search_calls.lock().unwrap() += 1;
        if self.search_fails {
            return Err(SyncError::Network("search unavailable".into()));
        }
        Ok(self.search.get(&query.to_uppercase()).cloned().unwrap_or_default())
    }

    async fn simple_prices(&self, ids: &[String], currency: &str) -> Result<PriceTable, SyncError> {
        self.price_calls.lock().unwrap().push(ids.to_vec());

        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(match self.fail_status {
                    Some(status) => SyncError::from_status(status, "upstream unavailable"),
                    None => SyncError::Network("connection reset".into()),
                });
            }
        }
        if self.rate_limit_multi && ids.len() > 1 {
            return Err(SyncError::RateLimited("429 Too Many Requests".into()));
        }

        Ok(ids
            .iter()
            .filter_map(|id| {
                let price = *self.prices.get(id)?;
                Some((id.clone(), HashMap::from([(currency.to_string(), price)])))
            })
            .collect())
    }

    async fn market_data(&self, id: &str) -> Result<CoinMarketData, SyncError> {
        self.market_calls.lock().unwrap().push(id.to_string());
        self.market
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::from_status(404, "coin not found"))
    }

    async fn trending(&self) -> Result<Vec<TrendingCoin>, SyncError> {
        Ok(self.trending.clone())
    }
}

// ─── Mapping store ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingStore {
    initial:   BTreeMap<String, String>,
    fail_load: bool,
    saves:     Arc<Mutex<Vec<BTreeMap<String, String>>>>,
}

impl RecordingStore {
    pub fn with_initial(entries: &[(&str, &str)]) -> Self {
        Self {
            initial: entries.iter().map(|(s, id)| (s.to_string(), id.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self { fail_load: true, ..Self::default() }
    }

    pub fn saves(&self) -> Arc<Mutex<Vec<BTreeMap<String, String>>>> {
        Arc::clone(&self.saves)
    }
}

impl MappingStore for RecordingStore {
    fn load(&self) -> Result<BTreeMap<String, String>, SyncError> {
        if self.fail_load {
            return Err(SyncError::Parse("corrupt mapping file".into()));
        }
        Ok(self.initial.clone())
    }

    fn save(&self, table: &BTreeMap<String, String>) -> Result<(), SyncError> {
        self.saves.lock().unwrap().push(table.clone());
        Ok(())
    }
}

// ─── Page fetcher ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeFetcher {
    pages:     HashMap<String, String>,
    fail_next: Mutex<u32>,
    calls:     Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn fail_next(self, n: u32) -> Self {
        *self.fail_next.lock().unwrap() = n;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SyncError> {
        self.calls.lock().unwrap().push(url.to_string());
        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(SyncError::Network("connection timed out".into()));
            }
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::from_status(404, "not found"))
    }
}

// ─── Spreadsheet ──────────────────────────────────────────────────────────────

/// A single-tab grid that understands the A1 ranges the sync engine issues
/// (`1:1`, `C2:C`, `A2:T`, `A2:T10`, `I7`). Reads trim trailing blanks the
/// way the real API does.
#[derive(Default)]
pub struct FakeSheets {
    grid:          Mutex<Vec<Vec<String>>>,
    batch_fails:   Mutex<u32>,
    rate_limited:  bool,
    broken_cells:  HashSet<String>,
    batch_calls:   Mutex<u32>,
    cell_calls:    Mutex<u32>,
    committed:     Mutex<Vec<CellUpdate>>,
}

impl FakeSheets {
    pub fn with_rows(rows: &[&[&str]]) -> Self {
        let grid = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        Self { grid: Mutex::new(grid), ..Self::default() }
    }

    /// The next `n` batch writes fail with a transient error.
    pub fn fail_batches(self, n: u32) -> Self {
        *self.batch_fails.lock().unwrap() = n;
        self
    }

    /// Batch failures report a 429 instead.
    pub fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    /// Single-cell writes to `cell` always fail.
    pub fn with_broken_cell(mut self, cell: &str) -> Self {
        self.broken_cells.insert(cell.to_string());
        self
    }

    pub fn batch_calls(&self) -> u32 {
        *self.batch_calls.lock().unwrap()
    }

    pub fn cell_calls(&self) -> u32 {
        *self.cell_calls.lock().unwrap()
    }

    pub fn committed(&self) -> Vec<CellUpdate> {
        self.committed.lock().unwrap().clone()
    }

    pub fn cell(&self, a1: &str) -> String {
        let (col, row) = split_a1(a1);
        let (Some(col), Some(row)) = (col, row) else { return String::new() };
        let grid = self.grid.lock().unwrap();
        grid.get(row - 1).and_then(|r| r.get(col)).cloned().unwrap_or_default()
    }

    fn apply(&self, update: &CellUpdate) {
        let (col, row) = split_a1(strip_tab(&update.cell));
        let (Some(col), Some(row)) = (col, row) else { return };
        let mut grid = self.grid.lock().unwrap();
        if grid.len() < row {
            grid.resize(row, Vec::new());
        }
        let line = &mut grid[row - 1];
        if line.len() <= col {
            line.resize(col + 1, String::new());
        }
        line[col] = update.value.clone();
        self.committed.lock().unwrap().push(update.clone());
    }
}

fn strip_tab(range: &str) -> &str {
    range.rsplit_once('!').map(|(_, r)| r).unwrap_or(range)
}

/// `"AB12"` → `(Some(27), Some(12))`; either half may be absent.
fn split_a1(a1: &str) -> (Option<usize>, Option<usize>) {
    let digits = a1.find(|c: char| c.is_ascii_digit()).unwrap_or(a1.len());
    let (letters, number) = a1.split_at(digits);
    let col = if letters.is_empty() { None } else { column_index(letters) };
    (col, number.parse().ok())
}

#[async_trait]
impl SheetsApi for FakeSheets {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let range = strip_tab(range);
        let (start, end) = range.split_once(':').unwrap_or((range, range));
        let (start_col, start_row) = split_a1(start);
        let (end_col, end_row) = split_a1(end);

        let grid = self.grid.lock().unwrap();
        let first_row = start_row.unwrap_or(1);
        let last_row = end_row.unwrap_or(grid.len()).min(grid.len());
        let first_col = start_col.unwrap_or(0);

        let mut rows: Vec<Vec<String>> = (first_row..=last_row)
            .map(|r| {
                let line = &grid[r - 1];
                let last_col = end_col.map(|c| c + 1).unwrap_or(line.len()).min(line.len());
                let mut cells: Vec<String> =
                    line.get(first_col..last_col).map(<[String]>::to_vec).unwrap_or_default();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<usize, SyncError> {
        *self.batch_calls.lock().unwrap() += 1;
        {
            let mut fails = self.batch_fails.lock().unwrap();
            if *fails > 0 {
                *fails -= 1;
                return Err(if self.rate_limited {
                    SyncError::from_status(429, "Quota exceeded for quota metric 'Write requests'")
                } else {
                    SyncError::from_status(503, "The service is currently unavailable")
                });
            }
        }
        for update in updates {
            self.apply(update);
        }
        Ok(updates.len())
    }

    async fn update_cell(&self, update: &CellUpdate) -> Result<(), SyncError> {
        *self.cell_calls.lock().unwrap() += 1;
        if self.broken_cells.contains(strip_tab(&update.cell)) {
            return Err(SyncError::from_status(400, "Unable to parse range"));
        }
        self.apply(update);
        Ok(())
    }
}
