use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// Formats tried, in order, when a date is not `MM/DD/YYYY` or `MM/DD/YY`.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

fn mdy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$").expect("valid date regex"))
}

fn fingerprint_noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s+(?:#\d+|ref|auth|pos|sq|-\s?\w+)$").expect("valid noise regex")
    })
}

/// An amount as it arrives from a parser: still text, or already numeric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawAmount<'a> {
    Text(&'a str),
    Number(f64),
}

impl<'a> From<&'a str> for RawAmount<'a> {
    fn from(s: &'a str) -> Self {
        RawAmount::Text(s)
    }
}

impl<'a> From<&'a String> for RawAmount<'a> {
    fn from(s: &'a String) -> Self {
        RawAmount::Text(s.as_str())
    }
}

impl From<f64> for RawAmount<'_> {
    fn from(n: f64) -> Self {
        RawAmount::Number(n)
    }
}

/// Parse a currency string such as `$1,234.56`, `-$12.00` or `(45.00)`.
///
/// Everything but digits and the decimal point is dropped; a leading `-`,
/// `$-` or full parentheses make the result negative. Unparseable text
/// yields `0.0`. Numbers pass through unchanged.
pub fn normalize_amount<'a>(raw: impl Into<RawAmount<'a>>) -> f64 {
    let text = match raw.into() {
        RawAmount::Number(n) => return n,
        RawAmount::Text(t) => t.trim(),
    };
    let negative = text.starts_with('-')
        || text.starts_with("$-")
        || (text.starts_with('(') && text.ends_with(')'));
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let magnitude: f64 = cleaned.parse().unwrap_or(0.0);
    if negative && magnitude != 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Two-digit years of 50 and above are 19xx, the rest 20xx.
pub fn expand_two_digit_year(yy: i32) -> i32 {
    if yy >= 50 {
        1900 + yy
    } else {
        2000 + yy
    }
}

fn parse_mdy(s: &str) -> Option<NaiveDate> {
    let caps = mdy_re().captures(s)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        year = expand_two_digit_year(year);
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_fallback(s: &str) -> Option<NaiveDate> {
    for fmt in FALLBACK_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Normalize a statement date to `YYYY-MM-DD`.
///
/// Returns the input unchanged when no format matches; callers detect
/// that with [`parse_iso_date`].
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    parse_mdy(s)
        .or_else(|| parse_fallback(s))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Parse an already-normalized `YYYY-MM-DD` date.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn normalize_description(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cased description with trailing volatile tokens (`#123`, `ref`,
/// `auth`, `pos`, `sq`, `- CODE`) removed.
pub fn normalize_description_for_fingerprint(s: &str) -> String {
    let collapsed = normalize_description(s).to_lowercase();
    fingerprint_noise_re()
        .replace(&collapsed, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_amount_plain() {
        assert_eq!(normalize_amount("45.67"), 45.67);
        assert_eq!(normalize_amount("$1,234.56"), 1234.56);
        assert_eq!(normalize_amount("  12  "), 12.0);
    }

    #[test]
    fn test_normalize_amount_negative_forms() {
        assert_eq!(normalize_amount("-45.67"), -45.67);
        assert_eq!(normalize_amount("-$1,000.00"), -1000.0);
        assert_eq!(normalize_amount("$-20.00"), -20.0);
        assert_eq!(normalize_amount("(500.00)"), -500.0);
        assert_eq!(normalize_amount("($1,234.56)"), -1234.56);
    }

    #[test]
    fn test_normalize_amount_garbage_is_zero() {
        assert_eq!(normalize_amount("n/a"), 0.0);
        assert_eq!(normalize_amount(""), 0.0);
        assert_eq!(normalize_amount("1.2.3"), 0.0);
        assert!(normalize_amount("-").is_sign_positive());
    }

    #[test]
    fn test_normalize_amount_number_passthrough() {
        assert_eq!(normalize_amount(-3.5), -3.5);
        assert_eq!(normalize_amount(0.1 + 0.2), 0.1 + 0.2);
    }

    #[test]
    fn test_normalize_amount_idempotent() {
        for raw in ["45.67", "-$12.00", "(9.99)", "$-0.50", "1,000", "junk"] {
            let once = normalize_amount(raw);
            assert_eq!(normalize_amount(once), once, "number form of {raw}");
            assert_eq!(normalize_amount(once.to_string().as_str()), once, "text form of {raw}");
        }
    }

    #[test]
    fn test_normalize_date_mdy() {
        assert_eq!(normalize_date("01/15/2025"), "2025-01-15");
        assert_eq!(normalize_date("1/5/2025"), "2025-01-05");
    }

    #[test]
    fn test_normalize_date_two_digit_pivot() {
        assert_eq!(normalize_date("01/15/99"), "1999-01-15");
        assert_eq!(normalize_date("01/15/20"), "2020-01-15");
        assert_eq!(normalize_date("06/30/50"), "1950-06-30");
        assert_eq!(normalize_date("06/30/49"), "2049-06-30");
    }

    #[test]
    fn test_normalize_date_fallback_formats() {
        assert_eq!(normalize_date("2025/01/03"), "2025-01-03");
        assert_eq!(normalize_date("2025-01-03"), "2025-01-03");
        assert_eq!(normalize_date("January 14, 2025"), "2025-01-14");
        assert_eq!(normalize_date("Jan 14, 2025"), "2025-01-14");
        assert_eq!(normalize_date("12-31-2024"), "2024-12-31");
        assert_eq!(normalize_date("2025-01-03T23:30:00-05:00"), "2025-01-04");
    }

    #[test]
    fn test_normalize_date_returns_original_on_failure() {
        assert_eq!(normalize_date("not a date"), "not a date");
        assert_eq!(normalize_date("02/30/2025"), "02/30/2025");
        assert_eq!(normalize_date("01/03"), "01/03");
        assert!(parse_iso_date(&normalize_date("13/01/2025")).is_none());
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("  STARBUCKS   STORE \t #123 "), "STARBUCKS STORE #123");
        assert_eq!(normalize_description(""), "");
    }

    #[test]
    fn test_description_for_fingerprint_strips_noise() {
        assert_eq!(normalize_description_for_fingerprint("STARBUCKS STORE #123"), "starbucks store");
        assert_eq!(normalize_description_for_fingerprint("Coffee Shop  POS"), "coffee shop");
        assert_eq!(normalize_description_for_fingerprint("NETFLIX.COM ref"), "netflix.com");
        assert_eq!(normalize_description_for_fingerprint("AMAZON MKTP - 4F2K9"), "amazon mktp");
        assert_eq!(normalize_description_for_fingerprint("SQ *BLUE BOTTLE sq"), "sq *blue bottle");
    }

    #[test]
    fn test_description_for_fingerprint_keeps_inner_tokens() {
        assert_eq!(normalize_description_for_fingerprint("POS DEBIT WALMART"), "pos debit walmart");
        assert_eq!(normalize_description_for_fingerprint("7-ELEVEN"), "7-eleven");
    }
}
