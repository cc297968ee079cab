//! # models::position
//!
//! Defines [`Position`] and [`ScrapedRecord`], the short-lived result of
//! scraping one explorer page. A record is produced once per URL per run,
//! projected straight into cell writes and then dropped.

use serde::{Deserialize, Serialize};

// ─── Direction ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Case-insensitive parse of the explorer's `Side:` value.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_uppercase().as_str() {
            "LONG"  => Some(Direction::Long),
            "SHORT" => Some(Direction::Short),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long  => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Position ─────────────────────────────────────────────────────────────────

/// One open trading position as printed on an explorer page.
///
/// Numeric fields stay strings: they are written back verbatim and the
/// spreadsheet does the parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Ticker with the synthetic `s` prefix already removed.
    pub symbol:         String,
    pub size:           String,
    pub direction:      Direction,
    pub realized_pnl:   String,
    pub unrealized_pnl: String,
}

impl Position {
    /// `BTC | Size: 0.5 | Side: LONG | Realized PnL: 1.00 | Unrealized PnL: -2.00`
    pub fn summary(&self) -> String {
        let mut out = format!("{} | Size: {} | Side: {}", self.symbol, self.size, self.direction);
        if !self.realized_pnl.is_empty() {
            out.push_str(&format!(" | Realized PnL: {}", self.realized_pnl));
        }
        if !self.unrealized_pnl.is_empty() {
            out.push_str(&format!(" | Unrealized PnL: {}", self.unrealized_pnl));
        }
        out
    }
}

/// Explorers name synthetic markets `sBTC`, `sETH`… The price API only knows
/// the underlying ticker. A lowercase word like `sol` is left alone.
pub fn strip_synthetic_prefix(symbol: &str) -> &str {
    match symbol.strip_prefix('s') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit()) => rest,
        _ => symbol,
    }
}

// ─── ScrapedRecord ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapedRecord {
    pub address:           String,
    pub collateral_amount: String,
    pub balance:           String,
    pub change:            String,
    /// Wall-clock completion time of the scrape, `%Y/%m/%d %H:%M:%S`.
    pub last_updated:      String,
    /// Human-readable one-liner of every extracted position.
    pub open_positions:    String,
    /// At most two, in page order.
    pub positions:         Vec<Position>,
}

impl ScrapedRecord {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Value for a column-mapping field name.
    ///
    /// * unqualified position fields (`symbol`, `size`, …) read position #1
    /// * `symbol1`/`symbol2` style names read the numbered slot
    /// * price fields are blanked here; the price step fills them afterwards
    ///
    /// Returns `None` for names this record knows nothing about.
    pub fn field_value(&self, field: &str) -> Option<String> {
        let value = match field {
            "address"           => self.address.clone(),
            "collateral_amount" => self.collateral_amount.clone(),
            "balance"           => self.balance.clone(),
            "change"            => self.change.clone(),
            "last_updated"      => self.last_updated.clone(),
            "open_positions"    => self.open_positions.clone(),
            _ => {
                let (base, slot) = split_slot(field);
                let position = self.positions.get(slot);
                match base {
                    "price"          => String::new(),
                    "symbol"         => position.map(|p| p.symbol.clone()).unwrap_or_default(),
                    "size"           => position.map(|p| p.size.clone()).unwrap_or_default(),
                    "direction"      => position.map(|p| p.direction.to_string()).unwrap_or_default(),
                    "realized_pnl"   => position.map(|p| p.realized_pnl.clone()).unwrap_or_default(),
                    "unrealized_pnl" => position.map(|p| p.unrealized_pnl.clone()).unwrap_or_default(),
                    _ => return None,
                }
            }
        };
        Some(value)
    }
}

/// `"symbol2"` → `("symbol", 1)`, `"symbol"` → `("symbol", 0)`.
pub fn split_slot(field: &str) -> (&str, usize) {
    match field.chars().last().and_then(|c| c.to_digit(10)) {
        Some(n) if n >= 1 => (&field[..field.len() - 1], n as usize - 1),
        _ => (field, 0),
    }
}
