//! Input validation for card numbers
//!
//! `CardNumber` enforces the canonical form used as the lookup key in the
//! `cards` table. The field is private to force validation through the
//! public API.

use std::fmt;

// ============================================================================
// Validation Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("Invalid length for {field}: expected {min}-{max}, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

// ============================================================================
// CardNumber - Validated Card Number (Private Fields)
// ============================================================================

pub const CARD_NUMBER_MIN_LEN: usize = 12;
pub const CARD_NUMBER_MAX_LEN: usize = 19;

/// Validated card number in canonical form (digits only)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardNumber(String);

impl CardNumber {
    /// Create a new validated CardNumber
    ///
    /// # Validation Rules
    /// - Spaces and dashes are separators and are dropped ("4000 0012 3456 7899")
    /// - Remaining characters must be ASCII digits
    /// - Length: 12-19 digits
    ///
    /// # Examples
    /// ```
    /// use cardledger::account::validation::CardNumber;
    ///
    /// let card = CardNumber::new("4000 0012 3456 7899").unwrap();
    /// assert_eq!(card.as_str(), "4000001234567899");
    ///
    /// assert!(CardNumber::new("4000-abcd").is_err());
    /// ```
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let digits: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "card_number",
                value: raw.trim().to_string(),
                expected: "digits, optionally grouped by spaces or dashes",
            });
        }

        if digits.len() < CARD_NUMBER_MIN_LEN || digits.len() > CARD_NUMBER_MAX_LEN {
            return Err(ValidationError::InvalidLength {
                field: "card_number",
                min: CARD_NUMBER_MIN_LEN,
                max: CARD_NUMBER_MAX_LEN,
                actual: digits.len(),
            });
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
