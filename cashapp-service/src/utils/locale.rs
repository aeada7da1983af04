//! European-locale parsing and formatting for Worldline CSV fields and
//! display values.
//!
//! Worldline exports use `;` as the field delimiter, a decimal comma, and
//! day-first dates, optionally with 2-digit years.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Two-digit years below this pivot map to 20xx, the rest to 19xx.
const YEAR_PIVOT: i32 = 50;

/// Parse a European decimal string into a `Decimal`.
///
/// The comma is the decimal separator; a dot is only accepted as a
/// thousands separator when a comma is also present (`"1.234,56"`).
/// Empty or unparseable input yields `None`.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    Decimal::from_str(&normalized).ok()
}

/// Parse a date in one of the accepted formats, in order:
/// `DD/MM/YYYY` (2-digit years pivot at 50), ISO `YYYY-MM-DD`, `DD-MM-YYYY`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains('/') {
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() == 3 {
            let day: u32 = parts[0].parse().ok()?;
            let month: u32 = parts[1].parse().ok()?;
            let year = expand_year(parts[2])?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }
        return None;
    }

    for fmt in ["%Y-%m-%d", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }

    None
}

/// Parse a datetime in one of `DD/MM/YYYY HH:MM[:SS]` or ISO
/// `YYYY-MM-DD HH:MM:SS`; input without a time component falls back to a
/// date-only parse at midnight.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }

    parse_date(trimmed).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 2 {
        if year < YEAR_PIVOT {
            Some(2000 + year)
        } else {
            Some(1900 + year)
        }
    } else {
        Some(year)
    }
}

/// Format an amount in Dutch notation: thousands dot, decimal comma,
/// always two decimals (`1234.5` → `"1.234,50"`).
pub fn format_amount(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let plain = format!("{:.2}", rounded);
    let (sign, digits) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::new();
    let bytes = int_part.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*b as char);
    }

    format!("{}{},{}", sign, grouped, frac_part)
}

/// Format a date for display: `DD/MM/YYYY`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Format a datetime for display: `DD/MM/YYYY HH:MM`.
pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%d/%m/%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn single_comma_decimal_parses() {
        assert_eq!(parse_decimal("1234,56"), Some(dec("1234.56")));
    }

    #[test]
    fn thousands_dot_with_decimal_comma_parses() {
        assert_eq!(parse_decimal("1.234,56"), Some(dec("1234.56")));
    }

    #[test]
    fn plain_dot_decimal_parses() {
        assert_eq!(parse_decimal("19.99"), Some(dec("19.99")));
    }

    #[test]
    fn empty_and_garbage_decimals_yield_none() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn slash_date_parses_day_first() {
        assert_eq!(
            parse_date("05/03/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn two_digit_year_pivots_at_50() {
        assert_eq!(parse_date("05/03/24"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(
            parse_date("31/12/99"),
            NaiveDate::from_ymd_opt(1999, 12, 31)
        );
        assert_eq!(parse_date("01/01/49"), NaiveDate::from_ymd_opt(2049, 1, 1));
        assert_eq!(parse_date("01/01/50"), NaiveDate::from_ymd_opt(1950, 1, 1));
    }

    #[test]
    fn iso_and_dashed_dates_parse() {
        assert_eq!(
            parse_date("2024-03-05"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_date("05-03-2024"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn invalid_dates_yield_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("32/13/2024"), None);
    }

    #[test]
    fn datetime_formats_parse_in_order() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 15)
            .unwrap();
        assert_eq!(parse_datetime("05/03/2024 14:30:15"), Some(expected));

        let no_seconds = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime("05/03/2024 14:30"), Some(no_seconds));
        assert_eq!(parse_datetime("2024-03-05 14:30:00"), Some(no_seconds));
    }

    #[test]
    fn datetime_falls_back_to_date_only() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("05/03/2024"), Some(midnight));
    }

    #[test]
    fn amounts_format_in_dutch_notation() {
        assert_eq!(format_amount(dec("1234.56")), "1.234,56");
        assert_eq!(format_amount(dec("0")), "0,00");
        assert_eq!(format_amount(dec("-9876543.2")), "-9.876.543,20");
        assert_eq!(format_amount(dec("999")), "999,00");
    }
}
