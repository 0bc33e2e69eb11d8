use chrono::Local;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::state::clock::parse_timestamp;

/// Whole-unit price, rounded down.
pub fn floor_price(price: Decimal) -> i64 {
    price.floor().to_i64().unwrap_or(i64::MAX)
}

/// `$` followed by the floored price with thousands separators.
pub fn format_price(price: Decimal) -> String {
    format!("${}", group_thousands(floor_price(price)))
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Number formed by all digits in a display text, e.g. `$1,200` -> 1200.
pub fn numeric_text(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Text following the first run of digits, if any.
pub fn count_suffix(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let suffix = &rest[end..];
    (!suffix.is_empty()).then_some(suffix)
}

/// Rewrite a bid count display, keeping whatever unit text it already has.
pub fn replace_count(current: &str, count: u64, default_suffix: &str) -> String {
    let suffix = count_suffix(current).unwrap_or(default_suffix);
    format!("{count}{suffix}")
}

/// `MM/DD HH:MM:SS` in local time; raw text when it can't be parsed.
pub fn format_bid_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(at) => at.with_timezone(&Local).format("%m/%d %H:%M:%S").to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn prices_are_floored_and_grouped() {
        assert_eq!(format_price(dec("0")), "$0");
        assert_eq!(format_price(dec("999.99")), "$999");
        assert_eq!(format_price(dec("1000")), "$1,000");
        assert_eq!(format_price(dec("1234567.5")), "$1,234,567");
    }

    #[test]
    fn numeric_text_ignores_currency_and_separators() {
        assert_eq!(numeric_text("$1,200"), Some(1200));
        assert_eq!(numeric_text("---"), None);
    }

    #[test]
    fn count_rewrite_keeps_localized_suffix() {
        assert_eq!(replace_count("5次出價", 6, "次出價"), "6次出價");
        assert_eq!(replace_count("12 bids", 13, "次出價"), "13 bids");
        assert_eq!(replace_count("", 1, " bids"), "1 bids");
        assert_eq!(replace_count("7", 8, "次出價"), "8次出價");
    }

    #[test]
    fn unparseable_bid_time_is_kept_verbatim() {
        assert_eq!(format_bid_time("soon"), "soon");
        assert_eq!(format_bid_time("2026-10-19T08:00:01Z").len(), "10/19 08:00:01".len());
    }
}
