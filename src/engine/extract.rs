//! # engine::extract — Position Extraction
//!
//! Pulls a [`ScrapedRecord`] out of an explorer page.
//!
//! ## Heuristics (in order)
//! 1. **Address**     — first `0x` + 40 or more hex digits in any text node
//! 2. **Balance**     — first text node holding a `$`/`＄` and a digit
//! 3. **Change**      — second such node (explorers print the delta after the balance)
//! 4. **Collateral**  — `Collateral Amount:` line, glyph up to the next whitespace
//! 5. **Positions**   — ordered [`PositionStrategy`] list over the flattened text;
//!    the first strategy that matches anything is used alone
//!
//! The page layout is controlled by third parties; every rule is best effort
//! and a miss simply leaves the field empty.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::Html;
use tracing::{debug, warn};

use crate::models::{strip_synthetic_prefix, Direction, Position, ScrapedRecord};
use crate::normalize::{clean_monetary_value, has_currency_glyph, CURRENCY_GLYPHS};

/// Positions kept per page; the sheet has two position column groups.
pub const MAX_POSITIONS: usize = 2;

/// Symbol used when the page omits the ticker.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

const COLLATERAL_LABEL: &str = "Collateral Amount:";

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]{40,}").expect("address pattern"));

static TICKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?P<symbol>s?[A-Z]{{2,10}})\s*{POSITION_TAIL}")).expect("ticker pattern")
});

static ALPHANUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?P<symbol>s?[A-Z][A-Z0-9]{{1,14}})\s*{POSITION_TAIL}")).expect("alphanumeric pattern")
});

static NO_TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(POSITION_TAIL).expect("no-ticker pattern"));

/// `Size: … Side: … [Realized PnL: …] [Unrealized PnL: …]`
///
/// Size and side are required. Each PnL label is optional and its value may
/// be non-numeric (`N/A`, `—`); such a value comes out empty. The unrealized
/// label may sit up to 20 characters past the realized value.
const POSITION_TAIL: &str = concat!(
    r"Size:\s*(?P<size>[\d,\.]+)\s*Side:\s*(?P<side>(?i:long|short))",
    r"(?:\s*Realized PnL:\s*(?P<realized>[+＄$\-\d,\.]*))?",
    r"(?:.{0,20}?Unrealized PnL:\s*(?P<unrealized>[+＄$\-\d,\.]*))?",
);

// ─── Strategies ───────────────────────────────────────────────────────────────

/// One named way of finding positions in flattened page text.
pub trait PositionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Every position this strategy recognises, in text order.
    fn find(&self, text: &str) -> Vec<Position>;
}

/// Regex with named groups `size` and `side`, plus optional `realized`,
/// `unrealized` and `symbol`. Without a `symbol` group the fallback symbol
/// is used.
pub struct PatternStrategy {
    name:            String,
    pattern:         Regex,
    fallback_symbol: Option<String>,
}

impl PatternStrategy {
    pub fn new(name: impl Into<String>, pattern: Regex, fallback_symbol: Option<&str>) -> Self {
        Self {
            name: name.into(),
            pattern,
            fallback_symbol: fallback_symbol.map(str::to_string),
        }
    }

    fn position_from(&self, caps: &Captures<'_>) -> Option<Position> {
        let symbol = caps
            .name("symbol")
            .map(|m| m.as_str())
            .or(self.fallback_symbol.as_deref())?;
        let direction = Direction::parse(caps.name("side")?.as_str())?;
        let pnl = |group: &str| {
            caps.name(group)
                .map(|m| clean_monetary_value(m.as_str()))
                .unwrap_or_default()
        };

        Some(Position {
            symbol:         strip_synthetic_prefix(symbol).to_string(),
            size:           caps.name("size")?.as_str().replace(',', ""),
            direction,
            realized_pnl:   pnl("realized"),
            unrealized_pnl: pnl("unrealized"),
        })
    }
}

impl PositionStrategy for PatternStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, text: &str) -> Vec<Position> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| self.position_from(&caps))
            .collect()
    }
}

/// `ticker` → `alphanumeric` → `no-ticker`.
pub fn default_strategies() -> Vec<Box<dyn PositionStrategy>> {
    vec![
        Box::new(PatternStrategy::new("ticker", TICKER_RE.clone(), None)),
        Box::new(PatternStrategy::new("alphanumeric", ALPHANUMERIC_RE.clone(), None)),
        Box::new(PatternStrategy::new("no-ticker", NO_TICKER_RE.clone(), Some(UNKNOWN_SYMBOL))),
    ]
}

// ─── PageParser ───────────────────────────────────────────────────────────────

pub struct PageParser {
    strategies: Vec<Box<dyn PositionStrategy>>,
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

impl PageParser {
    pub fn new(strategies: Vec<Box<dyn PositionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Append a lower-priority strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn PositionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Everything except `last_updated`, which the caller stamps.
    pub fn parse(&self, html: &str) -> ScrapedRecord {
        let document = Html::parse_document(html);
        let nodes: Vec<&str> = document.root_element().text().collect();
        let flat = nodes.concat();

        let mut record = ScrapedRecord {
            address: nodes
                .iter()
                .find_map(|node| ADDRESS_RE.find(node))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            ..Default::default()
        };

        let mut money = nodes
            .iter()
            .map(|node| node.trim())
            .filter(|node| has_currency_glyph(node) && node.chars().any(|c| c.is_ascii_digit()));
        record.balance = money.next().map(clean_monetary_value).unwrap_or_default();
        record.change = money.next().map(clean_monetary_value).unwrap_or_default();

        record.collateral_amount = collateral_amount(&flat).unwrap_or_default();

        record.positions = self.extract_positions(&flat);
        record.open_positions = record
            .positions
            .iter()
            .map(Position::summary)
            .collect::<Vec<_>>()
            .join(" | ");

        record
    }

    fn extract_positions(&self, text: &str) -> Vec<Position> {
        for strategy in &self.strategies {
            let mut found = strategy.find(text);
            if found.is_empty() {
                continue;
            }

            debug!(strategy = strategy.name(), count = found.len(), "Positions matched");
            if found.len() > MAX_POSITIONS {
                warn!(
                    strategy = strategy.name(),
                    found    = found.len(),
                    dropped  = found.len() - MAX_POSITIONS,
                    "More positions than sheet slots — keeping the first two"
                );
                found.truncate(MAX_POSITIONS);
            }
            return found;
        }
        Vec::new()
    }
}

/// Amount following the first `Collateral Amount:` label that has a glyph
/// after it. An `Open` token glued to the number (`$1,200.50Open Positions`)
/// is removed before normalizing.
fn collateral_amount(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let label = line.find(COLLATERAL_LABEL)?;
        let after_label = &line[label + COLLATERAL_LABEL.len()..];
        let glyph = after_label.find(CURRENCY_GLYPHS)?;
        let amount = after_label[glyph..]
            .trim_start_matches(CURRENCY_GLYPHS)
            .trim_start();
        let end = amount.find(char::is_whitespace).unwrap_or(amount.len());
        Some(clean_monetary_value(&amount[..end].replace("Open", "")))
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
