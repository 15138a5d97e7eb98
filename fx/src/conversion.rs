//! Currency conversion types and operations.

use chrono::{DateTime, Utc};
use fxquery_common::{Currency, RateDate, RateSnapshot};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FxError, FxResult};

/// Request to perform a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Amount to convert.
    #[serde(rename = "amount")]
    pub value: Decimal,
    /// Source currency.
    pub from: Currency,
    /// Target currency.
    pub to: Currency,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(value: Decimal, from: Currency, to: Currency) -> Self {
        Self { value, from, to }
    }
}

/// Represents a completed currency conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    /// The request that was executed.
    #[serde(flatten)]
    pub request: ConversionRequest,
    /// Converted amount, rounded to the engine precision.
    pub result: Decimal,
    /// Historical date of the rates, if not the latest.
    pub date: Option<RateDate>,
    /// When the conversion was executed.
    pub timestamp: DateTime<Utc>,
}

/// Converts amounts through a base currency.
///
/// Every rate in a snapshot is "units of currency per one unit of base". The base
/// currency itself always has rate one, whether or not the table lists it.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    base: Currency,
    precision: u32,
}

impl ConversionEngine {
    /// Create a new engine.
    pub fn new(base: Currency, precision: u32) -> Self {
        Self { base, precision }
    }

    /// Base currency.
    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// Decimal places of results.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Convert `amount` of `from` into `to` using `rates`.
    ///
    /// Both currencies are looked up before any arithmetic; a missing one is
    /// [`FxError::UnknownCurrency`].
    pub fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
        rates: &RateSnapshot,
    ) -> FxResult<Decimal> {
        let from_rate = self.rate_of(from, rates)?;
        let to_rate = self.rate_of(to, rates)?;

        let out_of_range = || FxError::InvalidQuery(format!("amount {} is out of range", amount));

        let in_base = if *from == self.base {
            amount
        } else {
            amount.checked_div(from_rate).ok_or_else(out_of_range)?
        };

        let converted = if *to == self.base {
            in_base
        } else {
            in_base.checked_mul(to_rate).ok_or_else(out_of_range)?
        };

        Ok(self.round(converted))
    }

    /// Execute a request and record it.
    pub fn execute(
        &self,
        request: ConversionRequest,
        rates: &RateSnapshot,
        date: Option<RateDate>,
    ) -> FxResult<Conversion> {
        let result = self.convert(request.value, &request.from, &request.to, rates)?;

        debug!(
            from = %request.from,
            to = %request.to,
            amount = %request.value,
            result = %result,
            "Conversion completed"
        );

        Ok(Conversion {
            request,
            result,
            date,
            timestamp: Utc::now(),
        })
    }

    /// Round to the configured precision, halves away from zero.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero)
    }

    fn rate_of(&self, currency: &Currency, rates: &RateSnapshot) -> FxResult<Decimal> {
        if *currency == self.base {
            return Ok(Decimal::ONE);
        }
        rates
            .rate(currency)
            .ok_or_else(|| FxError::UnknownCurrency(currency.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxquery_common::from_unix_seconds;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn rates(entries: &[(&str, Decimal)]) -> RateSnapshot {
        RateSnapshot::new(
            from_unix_seconds(1_700_000_000).unwrap(),
            entries.iter().map(|(c, r)| (Currency::new(*c), *r)),
        )
        .unwrap()
    }

    fn engine() -> ConversionEngine {
        ConversionEngine::new(Currency::usd(), 2)
    }

    #[test]
    fn test_from_base() {
        let table = rates(&[("EUR", dec!(0.9))]);
        let result = engine()
            .convert(dec!(100), &Currency::usd(), &Currency::eur(), &table)
            .unwrap();
        assert_eq!(result, dec!(90.00));
    }

    #[test]
    fn test_to_base() {
        let table = rates(&[("EUR", dec!(0.9))]);
        let result = engine()
            .convert(dec!(100), &Currency::eur(), &Currency::usd(), &table)
            .unwrap();
        assert_eq!(result, dec!(111.11));
    }

    #[test]
    fn test_cross_rate() {
        let table = rates(&[("USD", dec!(1)), ("EUR", dec!(0.9)), ("JPY", dec!(150))]);
        let result = engine()
            .convert(dec!(100), &Currency::jpy(), &Currency::eur(), &table)
            .unwrap();
        // 100 / 150 * 0.9 = 0.6
        assert_eq!(result, dec!(0.60));
    }

    #[test]
    fn test_self_conversion() {
        let table = rates(&[("EUR", dec!(0.9))]);
        let result = engine()
            .convert(dec!(42.5), &Currency::eur(), &Currency::eur(), &table)
            .unwrap();
        assert_eq!(result, dec!(42.5));
    }

    #[test]
    fn test_rounding_midpoint_away_from_zero() {
        let engine = ConversionEngine::new(Currency::usd(), 1);
        assert_eq!(engine.round(dec!(0.25)), dec!(0.3));
        assert_eq!(engine.round(dec!(-0.25)), dec!(-0.3));
        assert_eq!(engine.round(dec!(0.24)), dec!(0.2));
    }

    #[test]
    fn test_unknown_currency() {
        let table = rates(&[("EUR", dec!(0.9))]);

        let err = engine()
            .convert(dec!(1), &Currency::new("XYZ"), &Currency::eur(), &table)
            .unwrap_err();
        assert!(matches!(err, FxError::UnknownCurrency(c) if c.code() == "XYZ"));

        let err = engine()
            .convert(dec!(1), &Currency::eur(), &Currency::gbp(), &table)
            .unwrap_err();
        assert!(matches!(err, FxError::UnknownCurrency(c) if c == Currency::gbp()));
    }

    #[test]
    fn test_execute_records_request() {
        let table = rates(&[("EUR", dec!(0.9))]);
        let request = ConversionRequest::new(dec!(10), Currency::usd(), Currency::eur());

        let conversion = engine().execute(request.clone(), &table, None).unwrap();

        assert_eq!(conversion.request, request);
        assert_eq!(conversion.result, dec!(9.00));
        assert!(conversion.date.is_none());
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_tolerance(
            cents in 1i64..10_000_000,
            from_milli in 100i64..200_000,
            to_milli in 100i64..200_000,
        ) {
            let engine = ConversionEngine::new(Currency::usd(), 2);
            let table = rates(&[
                ("AAA", Decimal::new(from_milli, 3)),
                ("BBB", Decimal::new(to_milli, 3)),
            ]);
            let amount = Decimal::new(cents, 2);
            let a = Currency::new("AAA");
            let b = Currency::new("BBB");

            let there = engine.convert(amount, &a, &b, &table).unwrap();
            let back = engine.convert(there, &b, &a, &table).unwrap();

            // Rounding `there` to 0.005 moves `back` by at most 0.005 * from / to,
            // plus the final rounding step.
            let ratio = Decimal::new(from_milli, 3) / Decimal::new(to_milli, 3);
            let tolerance = dec!(0.005) * ratio + dec!(0.005) + dec!(0.000001);
            prop_assert!((back - amount).abs() <= tolerance, "{} -> {} -> {}", amount, there, back);
        }
    }
}
