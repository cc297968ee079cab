//! # normalize — Monetary Value Normalizer
//!
//! Turns scraped free text such as `"$-1,234.50"` or `"＄ 12.3.4"` into a plain
//! decimal string the spreadsheet can parse with `USER_ENTERED`.
//! Never fails: garbage in gives a (possibly empty) digit string out.

/// Currency glyphs recognised on explorer pages (ASCII and full-width dollar).
pub const CURRENCY_GLYPHS: [char; 2] = ['$', '＄'];

pub fn has_currency_glyph(text: &str) -> bool {
    text.contains(CURRENCY_GLYPHS)
}

/// Keep digits, one leading `-` and a single `.`.
///
/// Extra dots are folded into the fractional part: `"1.2.3"` → `"1.23"`.
pub fn clean_monetary_value(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();

    if kept.is_empty() {
        return kept;
    }

    let negative = kept.starts_with('-');
    let unsigned: String = kept.chars().filter(|c| *c != '-').collect();

    let mut parts = unsigned.split('.');
    let whole = parts.next().unwrap_or_default();
    let fraction: String = parts.collect();
    let has_dot = unsigned.contains('.');

    let mut out = String::with_capacity(unsigned.len() + 1);
    if negative {
        out.push('-');
    }
    out.push_str(whole);
    if has_dot {
        out.push('.');
        out.push_str(&fraction);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_dollar_and_commas() {
        assert_eq!(clean_monetary_value("$1,234.56"), "1234.56");
        assert_eq!(clean_monetary_value("＄ 42"), "42");
    }

    #[test]
    fn test_keeps_leading_minus() {
        assert_eq!(clean_monetary_value("$-12.50"), "-12.50");
        assert_eq!(clean_monetary_value("-$3"), "-3");
    }

    #[test]
    fn test_collapses_extra_dots() {
        assert_eq!(clean_monetary_value("1.2.3"), "1.23");
        assert_eq!(clean_monetary_value("..5"), ".5");
    }

    #[test]
    fn test_empty_and_noise() {
        assert_eq!(clean_monetary_value(""), "");
        assert_eq!(clean_monetary_value("N/A"), "");
        assert_eq!(clean_monetary_value("Open"), "");
    }

    #[test]
    fn test_inner_minus_dropped() {
        assert_eq!(clean_monetary_value("12-34"), "1234");
        assert_eq!(clean_monetary_value("--5"), "-5");
    }

    #[test]
    fn test_output_shape_holds_for_noisy_inputs() {
        let inputs = [
            "$-1,234.56 USD", "＄＄..--9", "abc", "-.-.-", "1e10", "Δ +3.5% ($12.00)",
            "0x1234abcd", "  -0.000001  ", "12.34.56.78", "$", "-",
        ];
        for input in inputs {
            let out = clean_monetary_value(input);
            assert!(
                out.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.'),
                "{input:?} -> {out:?}"
            );
            assert!(out.matches('.').count() <= 1, "{input:?} -> {out:?}");
            assert!(out.matches('-').count() <= 1, "{input:?} -> {out:?}");
            if out.contains('-') {
                assert!(out.starts_with('-'), "{input:?} -> {out:?}");
            }
        }
    }

    #[test]
    fn test_glyph_detection() {
        assert!(has_currency_glyph("Balance $10"));
        assert!(has_currency_glyph("＄10"));
        assert!(!has_currency_glyph("10 USDC"));
    }
}
