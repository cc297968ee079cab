//! # engine::scraper — fetch + parse with retry
//!
//! Wraps a [`PageFetcher`] and a [`PageParser`]. A URL that never loads
//! yields an empty [`ScrapedRecord`] so the caller can skip the row; nothing
//! here returns an error.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::engine::extract::PageParser;
use crate::fetch::PageFetcher;
use crate::models::ScrapedRecord;
use crate::retry::RetryPolicy;

/// Format of the `last_updated` stamp, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub struct Scraper {
    fetcher: Arc<dyn PageFetcher>,
    parser:  PageParser,
    policy:  RetryPolicy,
}

impl Scraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, parser: PageParser, max_attempts: u32) -> Self {
        Self { fetcher, parser, policy: RetryPolicy::scrape(max_attempts) }
    }

    pub async fn extract(&self, url: &str) -> ScrapedRecord {
        let url = url.trim();
        if url.is_empty() {
            debug!("Blank URL — nothing to scrape");
            return ScrapedRecord::default();
        }

        let html = match self
            .policy
            .run("explorer page", |attempt| {
                debug!(url, attempt, "Fetching explorer page");
                self.fetcher.fetch(url)
            })
            .await
        {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "Explorer page unavailable");
                return ScrapedRecord::default();
            }
        };

        let mut record = self.parser.parse(&html);
        record.last_updated = Local::now().format(TIMESTAMP_FORMAT).to_string();

        info!(
            url,
            address   = %record.address,
            positions = record.positions.len(),
            "🔎 Page scraped"
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use chrono::NaiveDateTime;
    use tokio::time::Instant;

    const URL: &str = "https://explorer.test/address/0xabc";
    const PAGE: &str = "<html><body><p>sETHSize: 2 Side: LONG Realized PnL: $5 Unrealized PnL: $-1</p></body></html>";

    fn scraper(fetcher: Arc<FakeFetcher>) -> Scraper {
        Scraper::new(fetcher, PageParser::default(), 3)
    }

    #[tokio::test]
    async fn test_blank_url_never_fetches() {
        let fetcher = Arc::new(FakeFetcher::default());
        let record = scraper(fetcher.clone()).extract("   ").await;
        assert!(record.is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_parses_and_stamps() {
        let fetcher = Arc::new(FakeFetcher::default().with_page(URL, PAGE).fail_next(2));
        let start = Instant::now();
        let record = scraper(fetcher.clone()).extract(URL).await;

        assert_eq!(fetcher.calls().len(), 3);
        // 5s then 10s of network backoff
        assert_eq!(start.elapsed().as_secs(), 15);
        assert_eq!(record.positions[0].symbol, "ETH");
        assert!(NaiveDateTime::parse_from_str(&record.last_updated, TIMESTAMP_FORMAT).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_give_empty_record() {
        let fetcher = Arc::new(FakeFetcher::default().fail_next(10));
        let record = scraper(fetcher.clone()).extract(URL).await;
        assert!(record.is_empty());
        assert_eq!(fetcher.calls().len(), 3);
    }
}
