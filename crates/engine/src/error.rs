//! The module contains the error the engine can throw.
//!
//! The taxonomy follows three tiers:
//!
//! - recoverable, field-level input problems ([`Validation`], [`InvalidAmount`],
//!   [`CurrencyMismatch`]) that the caller surfaces for correction,
//! - malformed boundary input ([`KeyNotFound`], [`ExistingKey`]),
//! - programming errors ([`InvariantViolation`]) that a correct embedding
//!   never produces, e.g. a balance delta requested without a line mutation.
//!
//! [`Validation`]: EngineError::Validation
//! [`InvalidAmount`]: EngineError::InvalidAmount
//! [`CurrencyMismatch`]: EngineError::CurrencyMismatch
//! [`KeyNotFound`]: EngineError::KeyNotFound
//! [`ExistingKey`]: EngineError::ExistingKey
//! [`InvariantViolation`]: EngineError::InvariantViolation
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    /// Shorthand for a field-level validation error.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Validation { field: a, reason: b },
                Self::Validation { field: c, reason: d },
            ) => a == c && b == d,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::InvariantViolation(a), Self::InvariantViolation(b)) => a == b,
            _ => false,
        }
    }
}
