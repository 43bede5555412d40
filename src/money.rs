//! Money Conversion Module
//!
//! All client-supplied amounts enter the system through [`parse_amount`].
//! Balances and transfer amounts are `Decimal` values
//! with at most [`CURRENCY_SCALE`] fractional digits, matching the
//! `NUMERIC(20, 2)` columns of the `cards` and `transfers` tables.
//!
//! ## Design Principles
//! 1. Explicit Error Handling: no silent rounding or truncation
//! 2. Strict Format: `.5`, `5.`, `+5`, `1e3` are rejected
//! 3. Positive Only: a zero amount is as invalid as a negative one
//!
//! ## Usage
//! ```rust
//! use cardledger::money::{format_amount, parse_amount};
//!
//! let amount = parse_amount("40.5").unwrap();
//! assert_eq!(format_amount(amount), "40.50");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Fractional digits of the account currency (kopecks / cents)
pub const CURRENCY_SCALE: u32 = 2;

/// Maximum digits before the decimal point (`NUMERIC(20, 2)` leaves 18)
pub const MAX_WHOLE_DIGITS: usize = 18;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal (String → Decimal)
// ============================================================================

/// Parse a client amount string into a validated currency `Decimal`
///
/// # Errors
/// * `InvalidFormat` - empty, signed, missing digits around the dot, non-digit characters
/// * `PrecisionOverflow` - more than [`CURRENCY_SCALE`] fractional digits
/// * `Overflow` - more than [`MAX_WHOLE_DIGITS`] whole digits
/// * `InvalidAmount` - the value is zero
pub fn parse_amount(amount_str: &str) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            // Require both sides of the dot to be non-empty
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in whole part: {}",
            whole
        )));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    // REJECT if too many decimals (no silent truncation!)
    if frac.len() > CURRENCY_SCALE as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: CURRENCY_SCALE,
        });
    }

    if whole.trim_start_matches('0').len() > MAX_WHOLE_DIGITS {
        return Err(MoneyError::Overflow);
    }

    let amount = Decimal::from_str(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;

    if amount.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount.normalize())
}

/// Largest balance a card can hold: 18 whole digits and 2 fractional ones
pub fn max_balance() -> Decimal {
    let units = 10_i128.pow(MAX_WHOLE_DIGITS as u32 + CURRENCY_SCALE) - 1;
    Decimal::from_i128_with_scale(units, CURRENCY_SCALE)
}

// ============================================================================
// Format: Internal → Client (Decimal → String)
// ============================================================================

/// Format an amount with exactly [`CURRENCY_SCALE`] decimals
pub fn format_amount(value: Decimal) -> String {
    format!("{:.prec$}", value, prec = CURRENCY_SCALE as usize)
}
