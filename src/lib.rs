//! # explorer-sheets
//!
//! Keeps a spreadsheet of trading accounts current: each row's explorer page
//! is scraped for balance, collateral and up to two open positions, then
//! every position symbol is priced through CoinGecko.

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod models;
pub mod normalize;
pub mod prices;
pub mod retry;
pub mod sheets;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorClass, SyncError};
