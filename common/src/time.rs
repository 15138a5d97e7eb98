//! Time utilities and calendar dates for historical rate lookups.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Rate timing constants.
pub mod constants {
    use super::Duration;

    /// Default lifetime of the latest snapshot before it counts as stale (1 hour).
    pub fn default_cache_ttl() -> Duration {
        Duration::hours(1)
    }

    /// Default upstream request timeout (10 seconds).
    pub fn default_request_timeout() -> Duration {
        Duration::seconds(10)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert Unix seconds to a timestamp.
pub fn from_unix_seconds(seconds: i64) -> Result<Timestamp> {
    DateTime::from_timestamp(seconds, 0).ok_or(CommonError::InvalidTimestamp(seconds))
}

/// A calendar date in `YYYY-MM-DD` form, used to request historical rates.
///
/// Only strings with exactly four year digits, two month digits and two day digits
/// that name a real date are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateDate(NaiveDate);

impl RateDate {
    /// Wire format of a rate date.
    pub const FORMAT: &'static str = "%Y-%m-%d";

    /// Parse and validate a date string.
    pub fn parse(value: &str) -> Result<Self> {
        if !has_date_shape(value) {
            return Err(CommonError::InvalidDate {
                value: value.to_string(),
                reason: "please use YYYY-MM-DD".to_string(),
            });
        }

        NaiveDate::parse_from_str(value, Self::FORMAT)
            .map(Self)
            .map_err(|e| CommonError::InvalidDate {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Get the underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

fn has_date_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl From<NaiveDate> for RateDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for RateDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for RateDate {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RateDate {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RateDate> for String {
    fn from(date: RateDate) -> Self {
        date.to_string()
    }
}
