//! Price normalization
//!
//! Storefront prices arrive as display text (`€ 129,99`, `€129.99`,
//! `€ 1.299,-`). Parsing strips everything but digits and separators, then
//! decides which separator is the decimal one:
//!
//! - both `,` and `.` present: the rightmost one is decimal, the other groups
//! - a single separator followed by exactly three digits groups thousands
//! - otherwise a single separator is decimal
//!
//! Amounts are held in whole cents so comparisons are exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("price text contains no digits: {0:?}")]
    NoDigits(String),

    #[error("price text is ambiguous: {0:?}")]
    Ambiguous(String),

    #[error("price out of range: {0:?}")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price {
    cents: i64,
}

impl Price {
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Nearest whole-cent price for a stored floating point amount
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(amount: f64) -> Self {
        Self { cents: (amount * 100.0).round() as i64 }
    }

    pub const fn cents(self) -> i64 {
        self.cents
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn parse(text: &str) -> Result<Self, PriceParseError> {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();
        // A leading separator marks a fraction-only price, so only trailing ones go
        let cleaned = cleaned.trim_end_matches(['.', ',']);

        if !cleaned.chars().any(|c| c.is_ascii_digit()) {
            return Err(PriceParseError::NoDigits(text.to_string()));
        }

        let (units, fraction) = split_decimal(cleaned, text)?;
        let fraction = match fraction.len() {
            0 => 0,
            1 => parse_digits(fraction, text)? * 10,
            2 => parse_digits(fraction, text)?,
            _ => return Err(PriceParseError::Ambiguous(text.to_string())),
        };

        let units = parse_digits(&units, text)?;
        units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .map(Self::from_cents)
            .ok_or_else(|| PriceParseError::OutOfRange(text.to_string()))
    }
}

/// Split cleaned price text into integer digits and fraction digits.
fn split_decimal<'a>(cleaned: &'a str, original: &str) -> Result<(String, &'a str), PriceParseError> {
    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let decimal_at = match (last_comma, last_dot) {
        (None, None) => None,
        (Some(c), Some(d)) => Some(c.max(d)),
        (Some(i), None) | (None, Some(i)) => {
            let separator = &cleaned[i..=i];
            let single = cleaned.matches(separator).count() == 1;
            let trailing_digits = cleaned.len() - i - 1;
            (single && (trailing_digits != 3 || i == 0)).then_some(i)
        }
    };

    match decimal_at {
        Some(i) => {
            let units: String = cleaned[..i].chars().filter(char::is_ascii_digit).collect();
            let fraction = &cleaned[i + 1..];
            if fraction.contains([',', '.']) {
                return Err(PriceParseError::Ambiguous(original.to_string()));
            }
            Ok((units, fraction))
        }
        None => Ok((cleaned.chars().filter(char::is_ascii_digit).collect(), "")),
    }
}

fn parse_digits(digits: &str, original: &str) -> Result<i64, PriceParseError> {
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<i64>()
        .map_err(|_| PriceParseError::OutOfRange(original.to_string()))
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Why a price ledger row was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceReason {
    FirstRecorded,
    Changed,
}

impl PriceReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstRecorded => "First recorded price",
            Self::Changed => "New price recorded",
        }
    }
}

impl fmt::Display for PriceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
