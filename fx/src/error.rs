//! FX engine error types.

use fxquery_common::{CommonError, Currency, RateKey};
use thiserror::Error;

/// Errors that can occur in the FX engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// Date string is malformed; rejected before any I/O.
    #[error("Invalid date format '{value}'. Please use YYYY-MM-DD")]
    InvalidDate { value: String },

    /// Upstream provider could not be reached or answered with garbage.
    #[error("Rate fetch failed: {0}")]
    FetchFailed(String),

    /// Upstream provider answered with a non-success status.
    #[error("Rate provider returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    /// No cached snapshot under this key.
    #[error("No cached rates for {0}")]
    CacheNotFound(RateKey),

    /// Cached snapshot exists but is older than the TTL.
    #[error("Cached rates for {key} expired ({age_seconds}s old)")]
    CacheExpired { key: RateKey, age_seconds: i64 },

    /// Cached or fetched value could not be decoded into a valid snapshot.
    #[error("Malformed rate snapshot: {0}")]
    MalformedSnapshot(String),

    /// Backing store I/O failure.
    #[error("Rate store error: {0}")]
    Storage(String),

    /// Every resolution strategy failed.
    #[error("No currency exchange data available for {0}")]
    Unavailable(RateKey),

    /// Currency is not in the rate table.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(Currency),

    /// Free-text query did not name two currencies.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FxError {
    /// Whether the caller supplied bad input (as opposed to a transient availability problem).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FxError::InvalidDate { .. } | FxError::UnknownCurrency(_) | FxError::InvalidQuery(_)
        )
    }

    /// Whether the resolver may fall through to its next strategy on this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FxError::FetchFailed(_)
                | FxError::UpstreamStatus { .. }
                | FxError::CacheNotFound(_)
                | FxError::CacheExpired { .. }
                | FxError::MalformedSnapshot(_)
                | FxError::Storage(_)
        )
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidDate { .. } => "INVALID_DATE",
            FxError::FetchFailed(_) => "FETCH_FAILED",
            FxError::UpstreamStatus { .. } => "UPSTREAM_STATUS",
            FxError::CacheNotFound(_) => "CACHE_NOT_FOUND",
            FxError::CacheExpired { .. } => "CACHE_EXPIRED",
            FxError::MalformedSnapshot(_) => "MALFORMED_SNAPSHOT",
            FxError::Storage(_) => "STORAGE_ERROR",
            FxError::Unavailable(_) => "RATES_UNAVAILABLE",
            FxError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            FxError::InvalidQuery(_) => "INVALID_QUERY",
            FxError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<CommonError> for FxError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::InvalidDate { value, .. } => FxError::InvalidDate { value },
            other => FxError::MalformedSnapshot(other.to_string()),
        }
    }
}

impl From<std::io::Error> for FxError {
    fn from(err: std::io::Error) -> Self {
        FxError::Storage(err.to_string())
    }
}

impl From<redis::RedisError> for FxError {
    fn from(err: redis::RedisError) -> Self {
        FxError::Storage(format!("redis: {}", err))
    }
}

impl From<tokio::task::JoinError> for FxError {
    fn from(err: tokio::task::JoinError) -> Self {
        FxError::Storage(format!("blocking I/O task failed: {}", err))
    }
}

impl From<reqwest::Error> for FxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FxError::FetchFailed(format!("request timed out: {}", err))
        } else if err.is_decode() {
            FxError::MalformedSnapshot(err.to_string())
        } else {
            FxError::FetchFailed(err.to_string())
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
