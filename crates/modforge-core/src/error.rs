//! # Error Types
//!
//! Leaf error types shared across the workspace. Pipeline-level errors
//! (validation, compilation, assembly, install) live in the crates that
//! raise them and wrap these via `#[from]`.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use a decimal string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// An identifier did not satisfy its naming rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} {value:?}: {rule}")]
pub struct IdentifierError {
    /// What kind of identifier was being parsed ("module name", "field name", ...).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// The rule the input violated.
    pub rule: &'static str,
}

/// A decimal literal was malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    /// The text is not of the form `-?digits(.digits)?`.
    #[error("not a decimal literal: {0:?}")]
    Malformed(String),

    /// The value needs more fractional digits than the declared scale allows.
    #[error("decimal {value} has {actual} fractional digits but the declared scale is {scale}")]
    ScaleExceeded {
        /// The literal being checked.
        value: String,
        /// Fractional digits present in the literal.
        actual: u32,
        /// Declared scale.
        scale: u32,
    },

    /// The value needs more total digits than the declared precision allows.
    #[error("decimal {value} needs {actual} significant digits but the declared precision is {precision}")]
    PrecisionExceeded {
        /// The literal being checked.
        value: String,
        /// Digits the literal needs.
        actual: u32,
        /// Declared precision.
        precision: u32,
    },
}

/// A generation stage observed the cancellation flag and aborted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("generation cancelled during {stage}")]
pub struct Cancelled {
    /// The stage that noticed the cancellation.
    pub stage: &'static str,
}
