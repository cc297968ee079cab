//! # config — Configuration from environment variables
//!
//! `.env` is loaded by the binary before [`Config::from_env`] runs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::engine::sync::SyncConfig;
use crate::layout::SheetLayout;
use crate::models::column_index;
use crate::prices::PriceConfig;
use crate::sheets::DEFAULT_API_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub spreadsheet_id:     String,
    /// OAuth bearer token for the Sheets API, obtained out of band.
    pub access_token:       String,
    pub sheets_api_url:     String,
    pub layout:             SheetLayout,
    pub sync:               SyncConfig,
    /// `None` picks the CoinGecko host from the key type.
    pub coingecko_url:      Option<String>,
    pub coingecko_key:      Option<String>,
    pub price:              PriceConfig,
    pub mapping_file:       PathBuf,
    pub scrape_max_retries: u32,
    pub scrape_timeout:     Duration,
    pub run_interval:       Duration,
    pub run_once:           bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let spreadsheet_id = std::env::var("SPREADSHEET_ID")
            .context("SPREADSHEET_ID environment variable is required")?;
        let access_token = std::env::var("SHEETS_ACCESS_TOKEN")
            .context("SHEETS_ACCESS_TOKEN environment variable is required")?;

        let url_column = env_or("URL_COLUMN", "C").to_uppercase();
        if column_index(&url_column).is_none() {
            bail!("URL_COLUMN must be column letters, got '{url_column}'");
        }

        let start_row: u32 = env_num("START_ROW", 2)?;
        let end_row: Option<u32> = match env_opt("END_ROW") {
            Some(v) => Some(v.parse().context("END_ROW must be a number")?),
            None => None,
        };
        if start_row < 2 {
            bail!("START_ROW must be 2 or more (row 1 is the header)");
        }
        if end_row.is_some_and(|end| end < start_row) {
            bail!("END_ROW must not be before START_ROW");
        }

        let layout = match env_opt("COLUMN_LAYOUT_FILE") {
            Some(path) => SheetLayout::from_json_file(&path)
                .with_context(|| format!("Failed to load column layout from {path}"))?,
            None => SheetLayout::default(),
        };

        let sync = SyncConfig {
            tab: env_opt("SHEET_TAB"),
            url_column,
            start_row,
            end_row,
            write_batch_size:  env_num("WRITE_BATCH_SIZE", 10)?,
            write_batch_delay: Duration::from_secs(env_num("WRITE_BATCH_DELAY_SECS", 2)?),
            write_max_retries: env_num("WRITE_MAX_RETRIES", 3)?,
            cell_delay:        Duration::from_millis(env_num("CELL_DELAY_MS", 500)?),
            row_delay:         Duration::from_secs(env_num("ROW_DELAY_SECS", 1)?),
        };

        let price = PriceConfig {
            currency:    env_or("PRICE_CURRENCY", "usd").to_lowercase(),
            batch_size:  env_num("PRICE_BATCH_SIZE", 50)?,
            batch_delay: Duration::from_secs(env_num("PRICE_BATCH_DELAY_SECS", 3)?),
            max_retries: env_num("PRICE_MAX_RETRIES", 3)?,
            ..PriceConfig::default()
        };

        Ok(Self {
            spreadsheet_id,
            access_token,
            sheets_api_url:     env_or("SHEETS_API_URL", DEFAULT_API_URL),
            layout,
            sync,
            coingecko_url:      env_opt("COINGECKO_API_URL"),
            coingecko_key:      env_opt("COINGECKO_API_KEY"),
            price,
            mapping_file:       PathBuf::from(env_or("COIN_MAPPING_FILE", "coin_mapping.json")),
            scrape_max_retries: env_num("SCRAPE_MAX_RETRIES", 3)?,
            scrape_timeout:     Duration::from_secs(15),
            run_interval:       Duration::from_secs(env_num("RUN_INTERVAL_SECS", 3600)?),
            run_once:           env_bool("RUN_ONCE"),
        })
    }
}

/// Set and non-blank.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_num<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(key) {
        Some(v) => v.trim().parse().with_context(|| format!("{key} must be a number, got '{v}'")),
        None => Ok(default),
    }
}

fn env_bool(key: &str) -> bool {
    env_opt(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
