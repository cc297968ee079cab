//! Domain models shared across the scrape, price and sync stages.

pub mod cell;
pub mod position;

pub use cell::{column_index, column_letter, CellUpdate};
pub use position::{strip_synthetic_prefix, Direction, Position, ScrapedRecord};
