//! Unit conversion between whole-unit decimal strings and smallest-unit integers.
//!
//! Chain values travel as `U256` smallest units (wei, token base units). Every
//! string handed to presentation is whole-unit, already divided by
//! `10^decimals`, so callers never re-scale.

use alloy_primitives::U256;
use thiserror::Error;

/// Decimals of the native currency (ETH)
pub const ETHER_DECIMALS: u8 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must not be negative")]
    Negative,

    #[error("invalid digit in amount: {0}")]
    InvalidDigit(String),

    #[error("too many decimal places: got {got}, max {max}")]
    TooManyDecimals { got: usize, max: u8 },

    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Parse a whole-unit decimal string ("0.1", "1", ".5") into smallest units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(UnitsError::Empty);
    }
    if amount.starts_with('-') {
        return Err(UnitsError::Negative);
    }

    let (int_part, frac_part) = amount.split_once('.').unwrap_or((amount, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(UnitsError::Empty);
    }

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(UnitsError::InvalidDigit(amount.to_string()));
    }

    if frac_part.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            got: frac_part.len(),
            max: decimals,
        });
    }

    let digits = format!(
        "{}{:0<width$}",
        if int_part.is_empty() { "0" } else { int_part },
        frac_part,
        width = decimals as usize
    );

    U256::from_str_radix(&digits, 10).map_err(|_| UnitsError::Overflow)
}

/// Split a smallest-unit value into its integer digits and a zero-padded
/// fraction exactly `decimals` long.
fn split_units(value: U256, decimals: u8) -> (String, String) {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return (digits, String::new());
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    (int_part.to_string(), frac_part.to_string())
}

/// Render smallest units as a whole-unit string with trailing zeros trimmed
/// but at least one fractional digit ("1.0", "0.05").
pub fn format_units(value: U256, decimals: u8) -> String {
    let (int_part, frac_part) = split_units(value, decimals);
    if decimals == 0 {
        return int_part;
    }

    let trimmed = frac_part.trim_end_matches('0');
    let frac = if trimmed.is_empty() { "0" } else { trimmed };
    format!("{int_part}.{frac}")
}

/// Render smallest units with exactly `places` fractional digits, truncating
/// toward zero. Truncation keeps a displayed spend amount from ever exceeding
/// the underlying value.
pub fn format_fixed(value: U256, decimals: u8, places: usize) -> String {
    let (int_part, frac_part) = split_units(value, decimals);
    if places == 0 {
        return int_part;
    }

    let frac: String = frac_part
        .chars()
        .chain(std::iter::repeat('0'))
        .take(places)
        .collect();
    format!("{int_part}.{frac}")
}

/// Re-render a whole-unit decimal string with exactly `places` fractional
/// digits. Returns the input unchanged if it is not a plain decimal.
pub fn reformat_fixed(amount: &str, decimals: u8, places: usize) -> String {
    match parse_units(amount, decimals) {
        Ok(value) => format_fixed(value, decimals, places),
        Err(_) => amount.to_string(),
    }
}
