//! Price text normalization for Vietnamese storefronts.
//!
//! Prices arrive as display strings such as `12.490.000₫` or `1.234,56 đ`.
//! The dong has no fractional minor unit in practice, so a lone `.` is
//! always a thousands separator.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

static CURRENCY_AND_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)vn[dđ]|[₫đ]|\s").expect("static regex"));
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[\d.,]+$").expect("static regex"));

/// Parses a display price into a positive number.
///
/// Only currency markers and whitespace are stripped; any other leftover
/// text (labels, hotline numbers, discounts) makes the price unparseable.
/// Returns `None` for that, for empty text and for anything `<= 0`.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let cleaned = CURRENCY_AND_SPACE.replace_all(text, "");
    if !NUMERIC.is_match(&cleaned) {
        return None;
    }

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let canonical = match (has_dot, has_comma) {
        (true, true) => cleaned.replace('.', "").replace(',', "."),
        (true, false) => cleaned.replace('.', ""),
        (false, true) => cleaned.replace(',', ""),
        (false, false) => cleaned.into_owned(),
    };

    let price = Decimal::from_str(&canonical).ok()?;
    if price <= Decimal::ZERO {
        tracing::debug!(text, "Rejected non-positive price");
        return None;
    }

    Some(price)
}

/// Parses a machine-readable attribute such as `data-price="12490000.0"`.
///
/// Unlike [`parse_price`], `.` is a decimal point here.
pub fn parse_price_attribute(value: &str) -> Option<Decimal> {
    let price = Decimal::from_str(value.trim()).ok()?;
    (price > Decimal::ZERO).then_some(price)
}

/// Formats an amount the way vi-VN storefronts display it: `12.490.000₫`.
pub fn format_vnd(amount: Decimal) -> String {
    let normalized = amount.normalize().to_string();
    let (integer, fraction) = match normalized.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (normalized.as_str(), None),
    };

    let (sign, digits) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    match fraction {
        Some(fraction) => format!("{}{},{}₫", sign, grouped, fraction),
        None => format!("{}{}₫", sign, grouped),
    }
}
