//! # explorer-sheets — scheduled sync
//!
//! ## Flow
//! ```text
//! start:  .env → Config → clients → SymbolCache (defaults + coin_mapping.json)
//! loop every RUN_INTERVAL_SECS (or once with RUN_ONCE):
//!   1. Scrape explorer URLs → position / collateral columns
//!   2. Resolve symbols → CoinGecko prices → price columns
//! Ctrl-C stops the loop between runs.
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use explorer_sheets::config::Config;
use explorer_sheets::engine::{PageParser, Scraper, SheetSync};
use explorer_sheets::fetch::HttpPageFetcher;
use explorer_sheets::prices::{CoinGeckoClient, JsonFileStore, PriceResolver, SymbolCache};
use explorer_sheets::sheets::GoogleSheetsClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("explorer_sheets=debug".parse()?)
            .add_directive("reqwest=warn".parse()?))
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════╗
  ║   EXPLORER SHEETS — Position Sync         ║
  ║   explorer pages → prices → spreadsheet   ║
  ╚═══════════════════════════════════════════╝"#);

    let config = Config::from_env().context("Failed to load config")?;

    let sheets = GoogleSheetsClient::new(
        Some(config.sheets_api_url.clone()),
        config.spreadsheet_id.clone(),
        config.access_token.clone(),
    )
    .context("Failed to create Sheets client")?;
    let prices = CoinGeckoClient::new(config.coingecko_url.clone(), config.coingecko_key.clone())
        .context("Failed to create CoinGecko client")?;
    let fetcher = HttpPageFetcher::new(config.scrape_timeout)
        .context("Failed to create page fetcher")?;

    let sync = SheetSync::new(
        Arc::new(sheets),
        Scraper::new(Arc::new(fetcher), PageParser::default(), config.scrape_max_retries),
        PriceResolver::new(Arc::new(prices), config.price.clone()),
        config.layout.clone(),
        config.sync.clone(),
    );
    let mut cache = SymbolCache::load(Box::new(JsonFileStore::new(&config.mapping_file)));

    info!(
        spreadsheet = %config.spreadsheet_id,
        tab         = config.sync.tab.as_deref().unwrap_or("(first)"),
        url_column  = %config.sync.url_column,
        symbols     = cache.len(),
        interval    = ?config.run_interval,
        run_once    = config.run_once,
        "Explorer Sheets started"
    );

    // ── Run Loop ──────────────────────────────────────────────────────────────
    loop {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("run", %run_id);

        match sync.run(&mut cache).instrument(span).await {
            Ok(report) => info!(
                %run_id,
                scraped    = report.scrape.rows_processed,
                priced     = report.prices.rows_processed,
                unresolved = ?report.unresolved,
                "✅ Run complete"
            ),
            Err(e) => error!(%run_id, error = %e, "❌ Run failed — will retry next interval"),
        }

        if config.run_once {
            break;
        }

        info!(interval = ?config.run_interval, "💤 Sleeping until next run...");
        tokio::select! {
            _ = tokio::time::sleep(config.run_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Ctrl-C received — shutting down");
                break;
            }
        }
    }

    Ok(())
}
