//! Scraping and sheet synchronization.

pub mod extract;
pub mod scraper;
pub mod sync;

pub use extract::{PageParser, PatternStrategy, PositionStrategy};
pub use scraper::Scraper;
pub use sync::{RunReport, SheetSync, StepSummary, SyncConfig};
