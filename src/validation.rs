//! Order number validation
//!
//! Order numbers are decimal strings protected by the Luhn checksum.
//! [`OrderNumber`] keeps its field private so every instance in the
//! system has passed [`luhn_valid`].

use std::fmt;

// ============================================================================
// Validation Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Order number is empty")]
    Empty,

    #[error("Order number contains a non-digit character: '{value}'")]
    NotNumeric { value: String },

    #[error("Order number fails the Luhn checksum: '{value}'")]
    BadChecksum { value: String },
}

// ============================================================================
// Luhn
// ============================================================================

/// Check a raw byte sequence against the Luhn rule.
///
/// Every byte must be an ASCII digit; empty input is invalid.
///
/// ```
/// use gophermart::validation::luhn_valid;
///
/// assert!(luhn_valid(b"123455"));
/// assert!(!luhn_valid(b"1234.5"));
/// ```
pub fn luhn_valid(input: &[u8]) -> bool {
    luhn_check(input).is_ok()
}

fn luhn_check(input: &[u8]) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !input.iter().all(u8::is_ascii_digit) {
        return Err(ValidationError::NotNumeric {
            value: String::from_utf8_lossy(input).into_owned(),
        });
    }

    // Double every second digit counting from the rightmost one.
    let sum: u32 = input
        .iter()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let d = d * 2;
                if d > 9 { d - 9 } else { d }
            } else {
                d
            }
        })
        .sum();

    if sum % 10 == 0 {
        Ok(())
    } else {
        Err(ValidationError::BadChecksum {
            value: String::from_utf8_lossy(input).into_owned(),
        })
    }
}

// ============================================================================
// OrderNumber - Validated Order Number (Private Field)
// ============================================================================

/// Luhn-valid order number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Parse an order number from a request body.
    ///
    /// Surrounding ASCII whitespace (a trailing newline from `curl -d @file`)
    /// is ignored; anything else must be a digit.
    pub fn parse(raw: &[u8]) -> Result<Self, ValidationError> {
        let trimmed = raw.trim_ascii();
        luhn_check(trimmed)?;
        // luhn_check guarantees ASCII digits
        Ok(Self(String::from_utf8_lossy(trimmed).into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
