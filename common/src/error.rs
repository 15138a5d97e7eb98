//! Error types for the shared value types.

use thiserror::Error;

/// Errors raised while constructing or decoding shared types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Date string does not match `YYYY-MM-DD` or is not a calendar date.
    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    /// A rate in a snapshot is zero or negative.
    #[error("Invalid rate for {currency}: {value} (rates must be positive)")]
    InvalidRate { currency: String, value: String },

    /// The same currency appears twice in one rate table.
    #[error("Duplicate rate for {0}")]
    DuplicateCurrency(String),

    /// Snapshot timestamp is outside the representable range.
    #[error("Invalid snapshot timestamp: {0}")]
    InvalidTimestamp(i64),
}

impl CommonError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidDate { .. } => "INVALID_DATE",
            CommonError::InvalidRate { .. } => "INVALID_RATE",
            CommonError::DuplicateCurrency(_) => "DUPLICATE_CURRENCY",
            CommonError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
        }
    }
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;
