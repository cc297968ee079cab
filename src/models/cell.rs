//! # models::cell
//!
//! [`CellUpdate`] — the atomic unit of spreadsheet mutation — plus the A1
//! notation helpers used to build its address.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    /// A1 address, optionally tab-qualified: `"I7"` or `"Positions!I7"`.
    pub cell:  String,
    pub value: String,
}

impl CellUpdate {
    pub fn new(cell: impl Into<String>, value: impl Into<String>) -> Self {
        Self { cell: cell.into(), value: value.into() }
    }
}

/// Zero-based column index → A1 letters (`0` → `A`, `26` → `AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 letters → zero-based column index. `None` for anything non-alphabetic
/// or too long to address.
pub fn column_index(letters: &str) -> Option<usize> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let n = letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |acc, b| acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize))?;
    Some(n - 1)
}

/// Prefix a range with `'Tab'!` when a tab is configured; otherwise the API
/// targets the first sheet. Quotes inside the name are doubled.
pub fn qualify(tab: Option<&str>, range: &str) -> String {
    match tab {
        Some(tab) if !tab.is_empty() => format!("'{}'!{range}", tab.replace('\'', "''")),
        _ => range.to_string(),
    }
}
