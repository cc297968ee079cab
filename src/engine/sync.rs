//! # engine::sync — Sheet Synchronization
//!
//! ## Run
//! ```text
//!  Step 1  header ─▶ validate(all mapped fields) ─▶ URL column
//!          └─ per row: scrape ─▶ stage cells ─▶ batch_write
//!  Step 2  header ─▶ validate(symbol/price slots) ─▶ data range
//!          └─ distinct symbols ─▶ PriceResolver ─▶ stage prices ─▶ batch_write
//! ```
//! A header mismatch in either step aborts the run before that step writes
//! anything. Row order is preserved and price writes always follow the
//! scrape writes of the same run.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::engine::extract::UNKNOWN_SYMBOL;
use crate::engine::scraper::Scraper;
use crate::error::SyncError;
use crate::layout::SheetLayout;
use crate::models::cell::qualify;
use crate::models::{column_index, column_letter, strip_synthetic_prefix, CellUpdate};
use crate::prices::{PriceResolver, SymbolCache};
use crate::retry::RetryPolicy;
use crate::sheets::SheetsApi;

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Optional tab name; `None` targets the first sheet.
    pub tab:               Option<String>,
    /// Column letters holding the explorer URL.
    pub url_column:        String,
    /// First data row (1-based, the header is row 1).
    pub start_row:         u32,
    /// Last data row; `None` reads to the end of the sheet.
    pub end_row:           Option<u32>,
    pub write_batch_size:  usize,
    pub write_batch_delay: Duration,
    pub write_max_retries: u32,
    /// Gap between single-cell fallback writes.
    pub cell_delay:        Duration,
    /// Gap between scraped rows.
    pub row_delay:         Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tab:               None,
            url_column:        "C".to_string(),
            start_row:         2,
            end_row:           None,
            write_batch_size:  10,
            write_batch_delay: Duration::from_secs(2),
            write_max_retries: 3,
            cell_delay:        Duration::from_millis(500),
            row_delay:         Duration::from_secs(1),
        }
    }
}

// ─── Summaries ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSummary {
    pub rows_seen:       usize,
    pub rows_processed:  usize,
    pub cells_staged:    usize,
    pub cells_committed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub scrape:     StepSummary,
    pub prices:     StepSummary,
    /// Symbols with no provider ID.
    pub unresolved: Vec<String>,
    /// Symbols with an ID but no quote.
    pub missing:    Vec<String>,
}

/// Pending writes for one step. A cell staged twice keeps its first value;
/// legacy and slot-1 fields share columns.
#[derive(Default)]
struct Staging {
    updates: Vec<CellUpdate>,
    seen:    HashSet<String>,
}

impl Staging {
    fn stage(&mut self, cell: String, value: String) {
        if self.seen.insert(cell.clone()) {
            self.updates.push(CellUpdate::new(cell, value));
        }
    }
}

// ─── SheetSync ────────────────────────────────────────────────────────────────

pub struct SheetSync {
    sheets:   Arc<dyn SheetsApi>,
    scraper:  Scraper,
    resolver: PriceResolver,
    layout:   SheetLayout,
    config:   SyncConfig,
}

impl SheetSync {
    pub fn new(
        sheets: Arc<dyn SheetsApi>,
        scraper: Scraper,
        resolver: PriceResolver,
        layout: SheetLayout,
        config: SyncConfig,
    ) -> Self {
        Self { sheets, scraper, resolver, layout, config }
    }

    /// Both steps. Only a header mismatch stops the run early; a failing
    /// scrape step is logged and the price step still runs.
    pub async fn run(&self, cache: &mut SymbolCache) -> Result<RunReport, SyncError> {
        let scrape = match self.fill_symbols().await {
            Ok(summary) => summary,
            Err(e @ SyncError::Validation(_)) => return Err(e),
            Err(e) => {
                error!(error = %e, "Scrape step failed — continuing with prices");
                StepSummary::default()
            }
        };

        let (prices, unresolved, missing) = self.price_step(cache).await?;

        info!(
            scraped_rows    = scrape.rows_processed,
            scrape_cells    = scrape.cells_committed,
            scrape_attempts = scrape.cells_staged,
            priced_rows     = prices.rows_processed,
            price_cells     = prices.cells_committed,
            price_attempts  = prices.cells_staged,
            "🏁 Sync run finished"
        );
        Ok(RunReport { scrape, prices, unresolved, missing })
    }

    /// Step 1: scrape every row with a URL and write its fields.
    pub async fn fill_symbols(&self) -> Result<StepSummary, SyncError> {
        info!("📥 Step 1 — scraping explorer pages");

        let header = self.read_header().await?;
        self.layout
            .validate(&header, self.layout.columns.keys().map(String::as_str))?;

        let url_col = self.url_column()?;
        let rows = self.read(&self.row_range(&url_col, &url_col)).await?;

        let mut summary = StepSummary { rows_seen: rows.len(), ..StepSummary::default() };
        let mut staging = Staging::default();
        let mut scraped = 0usize;

        for (offset, row) in rows.iter().enumerate() {
            let row_number = self.config.start_row as usize + offset;
            let url = row.first().map(|c| c.trim()).unwrap_or_default();
            if url.is_empty() {
                debug!(row = row_number, "No URL — skipped");
                continue;
            }

            if scraped > 0 {
                tokio::time::sleep(self.config.row_delay).await;
            }
            scraped += 1;

            info!(row = row_number, url, "Scraping row");
            let record = self.scraper.extract(url).await;
            if record.is_empty() {
                warn!(row = row_number, url, "Nothing scraped — row left as is");
                continue;
            }

            for (field, &col) in &self.layout.columns {
                match record.field_value(field) {
                    Some(value) => staging.stage(self.cell(col, row_number), value),
                    None => debug!(field = %field, "Field not produced by the scraper"),
                }
            }
            summary.rows_processed += 1;
        }

        summary.cells_staged = staging.updates.len();
        summary.cells_committed = self.batch_write(&staging.updates).await;
        info!(
            rows      = summary.rows_seen,
            scraped   = summary.rows_processed,
            committed = summary.cells_committed,
            staged    = summary.cells_staged,
            "✅ Step 1 done"
        );
        Ok(summary)
    }

    /// Step 2: price every symbol cell and write the matching price cell.
    pub async fn fill_prices(&self, cache: &mut SymbolCache) -> Result<StepSummary, SyncError> {
        self.price_step(cache).await.map(|(summary, _, _)| summary)
    }

    async fn price_step(
        &self,
        cache: &mut SymbolCache,
    ) -> Result<(StepSummary, Vec<String>, Vec<String>), SyncError> {
        info!("💱 Step 2 — filling prices");

        let slots = self.layout.price_slots();
        if slots.is_empty() {
            return Err(SyncError::Validation("no symbol/price column pair mapped".into()));
        }

        let header = self.read_header().await?;
        self.layout.validate(
            &header,
            slots.iter().flat_map(|(s, p)| [s.as_str(), p.as_str()]),
        )?;

        let columns: Vec<(usize, usize)> = slots
            .iter()
            .filter_map(|(s, p)| Some((self.layout.column(s)?, self.layout.column(p)?)))
            .collect();

        let last = column_letter(self.layout.last_column());
        let rows = self.read(&self.row_range("A", &last)).await?;
        let mut summary = StepSummary { rows_seen: rows.len(), ..StepSummary::default() };

        let wanted: BTreeSet<String> = rows
            .iter()
            .flat_map(|row| columns.iter().map(move |&(sym, _)| symbol_at(row, sym)))
            .filter(|s| !s.is_empty())
            .collect();
        if wanted.is_empty() {
            info!("No symbols in sheet — nothing to price");
            return Ok((summary, Vec::new(), Vec::new()));
        }

        let resolution = self.resolver.resolve_prices(cache, &wanted).await;

        let mut staging = Staging::default();
        for (offset, row) in rows.iter().enumerate() {
            let row_number = self.config.start_row as usize + offset;
            let mut priced = false;

            for &(sym_col, price_col) in &columns {
                let symbol = symbol_at(row, sym_col);
                if symbol.is_empty() {
                    continue;
                }
                match resolution.get(&symbol) {
                    Some(price) => {
                        staging.stage(self.cell(price_col, row_number), format_price(price));
                        priced = true;
                    }
                    None => warn!(row = row_number, symbol = %symbol, "No price — cell left as is"),
                }
            }
            if priced {
                summary.rows_processed += 1;
            }
        }

        summary.cells_staged = staging.updates.len();
        summary.cells_committed = self.batch_write(&staging.updates).await;
        info!(
            rows      = summary.rows_seen,
            priced    = summary.rows_processed,
            committed = summary.cells_committed,
            staged    = summary.cells_staged,
            "✅ Step 2 done"
        );
        Ok((summary, resolution.unresolved, resolution.missing))
    }

    /// Write `updates` in sub-batches; a sub-batch that exhausts its retries
    /// is written cell by cell. Returns the number of cells committed.
    pub async fn batch_write(&self, updates: &[CellUpdate]) -> usize {
        if updates.is_empty() {
            return 0;
        }

        let policy = RetryPolicy::sheet_write(self.config.write_max_retries);
        let size = self.config.write_batch_size.max(1);
        let batches = updates.len().div_ceil(size);
        let mut committed = 0;

        for (index, batch) in updates.chunks(size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.write_batch_delay).await;
            }

            match policy.run("sheet batch write", |_| self.sheets.batch_update(batch)).await {
                Ok(reported) => {
                    committed += batch.len();
                    debug!(batch = index + 1, of = batches, cells = batch.len(), reported, "Batch written");
                }
                Err(e) => {
                    warn!(
                        batch = index + 1,
                        error = %e,
                        "Batch write failed — falling back to single cells"
                    );
                    committed += self.write_cells(batch).await;
                }
            }
        }

        if committed == updates.len() {
            info!(committed, "📝 Sheet updated");
        } else {
            warn!(committed, attempted = updates.len(), "📝 Sheet partially updated");
        }
        committed
    }

    async fn write_cells(&self, cells: &[CellUpdate]) -> usize {
        let mut written = 0;
        for (i, update) in cells.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.cell_delay).await;
            }
            match self.sheets.update_cell(update).await {
                Ok(()) => written += 1,
                Err(e) => warn!(cell = %update.cell, error = %e, "Cell write failed — skipped"),
            }
        }
        written
    }

    // ─── Helpers ──────────────────────────────────────────────────────────────

    async fn read(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let range = qualify(self.config.tab.as_deref(), range);
        RetryPolicy::sheet_write(self.config.write_max_retries)
            .run("sheet read", |_| self.sheets.read_range(&range))
            .await
    }

    async fn read_header(&self) -> Result<Vec<String>, SyncError> {
        let header = self.read("1:1").await?.into_iter().next().unwrap_or_default();
        if header.is_empty() {
            return Err(SyncError::Validation("header row is empty".into()));
        }
        Ok(header)
    }

    fn url_column(&self) -> Result<String, SyncError> {
        column_index(&self.config.url_column)
            .map(column_letter)
            .ok_or_else(|| SyncError::Validation(format!("bad URL column {:?}", self.config.url_column)))
    }

    fn row_range(&self, first_col: &str, last_col: &str) -> String {
        let end = self.config.end_row.map(|r| r.to_string()).unwrap_or_default();
        format!("{first_col}{}:{last_col}{end}", self.config.start_row)
    }

    fn cell(&self, col: usize, row: usize) -> String {
        qualify(self.config.tab.as_deref(), &format!("{}{row}", column_letter(col)))
    }
}

/// Sheet symbol → lookup key. The extraction placeholder is never priced.
fn symbol_at(row: &[String], col: usize) -> String {
    let symbol = row
        .get(col)
        .map(|c| strip_synthetic_prefix(c.trim()).to_uppercase())
        .unwrap_or_default();
    if symbol == UNKNOWN_SYMBOL {
        String::new()
    } else {
        symbol
    }
}

/// Two decimals from 1 up, six below.
pub fn format_price(price: f64) -> String {
    if price.abs() >= 1.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.6}")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
