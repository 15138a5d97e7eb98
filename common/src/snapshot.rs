//! Rate snapshots and the keys they are cached under.

use chrono::{Duration, SubsecRound};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CommonError;
use crate::monetary::Currency;
use crate::time::{from_unix_seconds, RateDate, Timestamp};

/// Identifies which rate table is wanted: the current one or a historical date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// Most recent rates.
    Latest,
    /// Closing rates of a given day.
    Historical(RateDate),
}

impl RateKey {
    /// Cache key string: empty for latest, the date string for historical.
    pub fn cache_key(&self) -> String {
        match self {
            RateKey::Latest => String::new(),
            RateKey::Historical(date) => date.to_string(),
        }
    }

    /// Whether this key names an immutable historical table.
    pub fn is_historical(&self) -> bool {
        matches!(self, RateKey::Historical(_))
    }

}

impl From<Option<RateDate>> for RateKey {
    fn from(date: Option<RateDate>) -> Self {
        date.map_or(RateKey::Latest, RateKey::Historical)
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::Latest => write!(f, "latest"),
            RateKey::Historical(date) => write!(f, "{}", date),
        }
    }
}

/// Wire shape shared by the upstream response and the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshot {
    timestamp: i64,
    rates: BTreeMap<String, Decimal>,
}

/// One immutable capture of exchange rates relative to the base currency.
///
/// Deserialization validates every rate: a zero or negative value is a
/// structured error rather than something discovered during conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot", into = "RawSnapshot")]
pub struct RateSnapshot {
    fetched_at: Timestamp,
    rates: BTreeMap<Currency, Decimal>,
}

impl RateSnapshot {
    /// Create a snapshot, rejecting non-positive rates and repeated currencies.
    pub fn new(
        fetched_at: Timestamp,
        rates: impl IntoIterator<Item = (Currency, Decimal)>,
    ) -> Result<Self, CommonError> {
        let mut table = BTreeMap::new();
        for (currency, rate) in rates {
            if rate <= Decimal::ZERO {
                return Err(CommonError::InvalidRate {
                    currency: currency.to_string(),
                    value: rate.to_string(),
                });
            }
            // Codes are case-folded, so "eur" and "EUR" would otherwise collide.
            if table.contains_key(&currency) {
                return Err(CommonError::DuplicateCurrency(currency.to_string()));
            }
            table.insert(currency, rate);
        }

        Ok(Self {
            // The wire format carries whole seconds only.
            fetched_at: fetched_at.trunc_subsecs(0),
            rates: table,
        })
    }

    /// When the upstream produced these rates.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Age of the snapshot at `now`.
    pub fn age(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.fetched_at)
    }

    /// Rate for a currency, if present.
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }

    /// Whether the table has a rate for the currency.
    pub fn contains(&self, currency: &Currency) -> bool {
        self.rates.contains_key(currency)
    }

    /// All rates, ordered by currency code.
    pub fn rates(&self) -> &BTreeMap<Currency, Decimal> {
        &self.rates
    }

    /// Currencies in the table.
    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.rates.keys()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl TryFrom<RawSnapshot> for RateSnapshot {
    type Error = CommonError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        let fetched_at = from_unix_seconds(raw.timestamp)?;
        RateSnapshot::new(
            fetched_at,
            raw.rates
                .into_iter()
                .map(|(code, rate)| (Currency::new(code), rate)),
        )
    }
}

impl From<RateSnapshot> for RawSnapshot {
    fn from(snapshot: RateSnapshot) -> Self {
        Self {
            timestamp: snapshot.fetched_at.timestamp(),
            rates: snapshot
                .rates
                .into_iter()
                .map(|(currency, rate)| (currency.into(), rate))
                .collect(),
        }
    }
}
