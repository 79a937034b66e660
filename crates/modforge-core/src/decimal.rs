//! # Decimal Literals
//!
//! Decimal defaults are carried as the exact text the specification author
//! wrote. Nothing in the generator parses them into binary floating point, so
//! `"1234567890.123456789"` reaches the generated field declaration unchanged.

use serde::{Deserialize, Serialize};

use crate::error::DecimalError;

/// An exact decimal value: `-?digits(.digits)?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DecimalLiteral(String);

impl DecimalLiteral {
    /// Parse a decimal literal.
    ///
    /// A leading `+`, exponents, and bare `.5`/`5.` forms are rejected so each
    /// value has exactly one spelling up to trailing zeros.
    pub fn parse(s: &str) -> Result<Self, DecimalError> {
        let body = s.strip_prefix('-').unwrap_or(s);
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (body, None),
        };
        let digits_ok = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !digits_ok(int_part) || frac_part.is_some_and(|f| !digits_ok(f)) {
            return Err(DecimalError::Malformed(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Build a literal from an integer value.
    pub fn from_integer(value: i64) -> Self {
        Self(value.to_string())
    }

    /// Access the literal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits after the decimal point, as written.
    pub fn scale(&self) -> u32 {
        self.0
            .split_once('.')
            .map(|(_, f)| f.len() as u32)
            .unwrap_or(0)
    }

    /// Number of significant integer digits (leading zeros ignored).
    pub fn integer_digits(&self) -> u32 {
        let body = self.0.strip_prefix('-').unwrap_or(&self.0);
        let int_part = body.split_once('.').map(|(i, _)| i).unwrap_or(body);
        int_part.trim_start_matches('0').len() as u32
    }

    /// Check that the literal fits a `(precision, scale)` column without rounding.
    pub fn check_fits(&self, precision: u32, scale: u32) -> Result<(), DecimalError> {
        if self.scale() > scale {
            return Err(DecimalError::ScaleExceeded {
                value: self.0.clone(),
                actual: self.scale(),
                scale,
            });
        }
        let needed = self.integer_digits() + scale;
        if needed > precision {
            return Err(DecimalError::PrecisionExceeded {
                value: self.0.clone(),
                actual: needed,
                precision,
            });
        }
        Ok(())
    }
}

impl TryFrom<String> for DecimalLiteral {
    type Error = DecimalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DecimalLiteral> for String {
    fn from(value: DecimalLiteral) -> Self {
        value.0
    }
}

impl std::fmt::Display for DecimalLiteral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
