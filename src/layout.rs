//! # layout — Column map and header validation
//!
//! The sheet is shared with humans who insert and rename columns. Before any
//! write, every mapped column's live header is checked against a list of
//! accepted substrings (English and Traditional Chinese). A mismatch stops
//! the run instead of writing into the wrong column.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::models::column_letter;

/// Zero-based column indices for every field the sync engine writes.
const DEFAULT_COLUMNS: &[(&str, usize)] = &[
    ("last_updated", 4),
    ("collateral_amount", 6),
    ("open_positions", 7),
    ("symbol1", 8),
    ("price1", 9),
    ("size1", 10),
    ("direction1", 11),
    ("realized_pnl1", 12),
    ("unrealized_pnl1", 13),
    ("symbol2", 14),
    ("price2", 15),
    ("size2", 16),
    ("direction2", 17),
    ("realized_pnl2", 18),
    ("unrealized_pnl2", 19),
    // legacy single-position names, same columns as slot 1
    ("symbol", 8),
    ("price", 9),
    ("size", 10),
    ("direction", 11),
    ("realized_pnl", 12),
    ("unrealized_pnl", 13),
];

const DEFAULT_EXPECTED: &[(usize, &[&str])] = &[
    (4, &["last updated", "last_updated", "最後更新", "更新時間"]),
    (6, &["collateral amount", "collateral", "抵押", "抵押金額"]),
    (7, &["open positions", "open_positions", "開放倉位", "倉位"]),
    (8, &["symbol1", "symbol", "幣種1", "代幣1"]),
    (9, &["price1", "price", "價格1", "current price"]),
    (10, &["size1", "size", "大小1", "倉位大小1"]),
    (11, &["direction1", "direction", "方向1", "side1", "交易方向1"]),
    (12, &["realized pnl1", "realized_pnl1", "已實現盈虧1"]),
    (13, &["unrealized pnl1", "unrealized_pnl1", "未實現盈虧1"]),
    (14, &["symbol2", "幣種2", "代幣2"]),
    (15, &["price2", "價格2"]),
    (16, &["size2", "大小2", "倉位大小2"]),
    (17, &["direction2", "方向2", "side2", "交易方向2"]),
    (18, &["realized pnl2", "realized_pnl2", "已實現盈虧2"]),
    (19, &["unrealized pnl2", "unrealized_pnl2", "未實現盈虧2"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Field name → zero-based column.
    pub columns:          BTreeMap<String, usize>,
    /// Column → accepted header substrings (case-insensitive).
    pub expected_headers: BTreeMap<usize, Vec<String>>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS
                .iter()
                .map(|(field, col)| (field.to_string(), *col))
                .collect(),
            expected_headers: DEFAULT_EXPECTED
                .iter()
                .map(|(col, names)| (*col, names.iter().map(|n| n.to_string()).collect()))
                .collect(),
        }
    }
}

impl SheetLayout {
    /// Replace the built-in layout with a JSON file of the same shape:
    /// `{"columns": {"symbol1": 8}, "expected_headers": {"8": ["symbol"]}}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let layout: Self = serde_json::from_str(&text)?;
        info!(path = %path.display(), columns = layout.columns.len(), "📐 Column layout loaded");
        Ok(layout)
    }

    pub fn column(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// Right-most mapped column.
    pub fn last_column(&self) -> usize {
        self.columns.values().copied().max().unwrap_or(0)
    }

    /// `(symbol field, price field)` per position slot that has both mapped.
    /// Falls back to the legacy pair when no numbered slot exists.
    pub fn price_slots(&self) -> Vec<(String, String)> {
        let numbered: Vec<(String, String)> = (1..=2)
            .map(|n| (format!("symbol{n}"), format!("price{n}")))
            .filter(|(s, p)| self.columns.contains_key(s) && self.columns.contains_key(p))
            .collect();
        if !numbered.is_empty() {
            return numbered;
        }
        if self.columns.contains_key("symbol") && self.columns.contains_key("price") {
            return vec![("symbol".into(), "price".into())];
        }
        Vec::new()
    }

    /// Check `fields` against the live header row. Every problem is logged;
    /// any problem fails the whole check.
    pub fn validate<'a, I>(&self, header: &[String], fields: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut problems = Vec::new();

        for field in fields {
            let Some(index) = self.column(field) else {
                problems.push(format!("{field}: not in column map"));
                continue;
            };
            let letter = column_letter(index);

            let Some(observed) = header.get(index) else {
                problems.push(format!("{field} ({letter}): no header cell"));
                continue;
            };
            let Some(expected) = self.expected_headers.get(&index) else {
                problems.push(format!("{field} ({letter}): no expected header names configured"));
                continue;
            };

            let lowered = observed.trim().to_lowercase();
            if expected.iter().any(|name| lowered.contains(&name.to_lowercase())) {
                debug!(field, column = %letter, header = %observed, "Column ok");
            } else {
                problems.push(format!("{field} ({letter}): header {observed:?} matches none of {expected:?}"));
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        for problem in &problems {
            warn!(%problem, "❌ Column mismatch");
        }
        Err(SyncError::Validation(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[(usize, &str)]) -> Vec<String> {
        let mut row = vec![String::new(); 20];
        for (i, text) in cells {
            row[*i] = text.to_string();
        }
        row
    }

    #[test]
    fn test_symbol_ok_notes_rejected() {
        let layout = SheetLayout::default();
        let row = header(&[(8, "Symbol1"), (9, "Notes")]);

        assert!(layout.validate(&row, ["symbol1"]).is_ok());
        let err = layout.validate(&row, ["symbol1", "price1"]).unwrap_err();
        assert!(matches!(err, SyncError::Validation(ref m) if m.contains("price1 (J)")));
    }

    #[test]
    fn test_chinese_headers_accepted() {
        let layout = SheetLayout::default();
        let row = header(&[(8, "幣種1"), (9, "價格1 (USD)"), (4, "最後更新時間")]);
        assert!(layout.validate(&row, ["symbol1", "price1", "last_updated"]).is_ok());
    }

    #[test]
    fn test_short_header_row_fails() {
        let layout = SheetLayout::default();
        let row = vec!["Name".to_string(), "Owner".into(), "URL".into()];
        assert!(layout.validate(&row, ["symbol1"]).is_err());
    }

    #[test]
    fn test_column_without_expected_names_fails() {
        let mut layout = SheetLayout::default();
        layout.columns.insert("balance".into(), 5);
        let row = header(&[(5, "Balance")]);
        assert!(layout.validate(&row, ["balance"]).is_err());
    }

    #[test]
    fn test_unknown_field_fails() {
        let layout = SheetLayout::default();
        assert!(layout.validate(&header(&[]), ["nonsense"]).is_err());
    }

    #[test]
    fn test_price_slots() {
        let layout = SheetLayout::default();
        assert_eq!(
            layout.price_slots(),
            vec![("symbol1".to_string(), "price1".to_string()), ("symbol2".into(), "price2".into())]
        );
        assert_eq!(layout.last_column(), 19);

        let legacy = SheetLayout {
            columns: BTreeMap::from([("symbol".to_string(), 2), ("price".to_string(), 3)]),
            expected_headers: BTreeMap::new(),
        };
        assert_eq!(legacy.price_slots(), vec![("symbol".to_string(), "price".to_string())]);
    }

    #[test]
    fn test_layout_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(
            &path,
            r#"{"columns":{"symbol1":2,"price1":3},"expected_headers":{"2":["ticker"],"3":["px"]}}"#,
        )
        .unwrap();

        let layout = SheetLayout::from_json_file(&path).unwrap();
        assert_eq!(layout.column("price1"), Some(3));
        let row = vec![String::new(), String::new(), "Ticker".into(), "Px USD".into()];
        assert!(layout.validate(&row, ["symbol1", "price1"]).is_ok());
    }
}
