//! Coin amount parsing
//!
//! The remote service sends amounts as decimal strings with up to eight
//! fractional digits. They are converted to integer base units without
//! ever passing through a float.

use crate::error::{SignerError, SignerResult};

/// Base units per coin
pub const UNITS_PER_COIN: u64 = 100_000_000;

const DECIMALS: usize = 8;

/// Parse a decimal string ("1.5", "0.00010000") into base units
pub fn parse_amount(value: &str) -> SignerResult<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SignerError::invalid_input("Amount is empty"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(SignerError::invalid_input(format!("Invalid amount: {}", value)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(SignerError::invalid_input(format!("Invalid amount: {}", value)));
    }
    if fraction.len() > DECIMALS {
        return Err(SignerError::invalid_input(format!(
            "Amount {} has more than {} decimal places",
            value, DECIMALS
        )));
    }

    let whole_units: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| SignerError::invalid_input(format!("Amount out of range: {}", value)))?
    };

    let fraction_units: u64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = DECIMALS);
        padded
            .parse()
            .map_err(|_| SignerError::invalid_input(format!("Invalid amount: {}", value)))?
    };

    whole_units
        .checked_mul(UNITS_PER_COIN)
        .and_then(|u| u.checked_add(fraction_units))
        .ok_or_else(|| SignerError::invalid_input(format!("Amount out of range: {}", value)))
}

/// Format base units back into an eight-decimal string
pub fn format_amount(units: u64) -> String {
    format!("{}.{:08}", units / UNITS_PER_COIN, units % UNITS_PER_COIN)
}
