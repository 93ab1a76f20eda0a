//! Pivot-based rate tables.

use crate::domain::currency::{CurrencyCode, SATS_PER_BTC};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Units of each currency per one unit of [`CurrencyCode::PIVOT`].
///
/// The pivot always maps to exactly 1. Tables are built whole and never
/// patched in place; a refresh produces a new table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<CurrencyCode, f64>", into = "BTreeMap<CurrencyCode, f64>")]
pub struct RateTable {
    rates: BTreeMap<CurrencyCode, f64>,
}

impl RateTable {
    /// A table holding only the pivot.
    pub fn new() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(CurrencyCode::PIVOT, 1.0);
        Self { rates }
    }

    /// Builds a table, dropping non-finite or non-positive rates.
    ///
    /// Any pivot entry is overwritten with 1, and satoshi entries are ignored
    /// since they derive from BTC.
    pub fn from_rates<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = (CurrencyCode, f64)>,
    {
        let mut table = Self::new();
        for (code, rate) in rates {
            if code == CurrencyCode::PIVOT || code == CurrencyCode::BtcSats {
                continue;
            }
            if rate.is_finite() && rate > 0.0 {
                table.rates.insert(code, rate);
            }
        }
        table
    }

    /// Combines fiat and crypto rate sets; crypto wins on a clash.
    pub fn merge<F, C>(fiat: F, crypto: C) -> Self
    where
        F: IntoIterator<Item = (CurrencyCode, f64)>,
        C: IntoIterator<Item = (CurrencyCode, f64)>,
    {
        Self::from_rates(fiat.into_iter().chain(crypto))
    }

    /// Rate for `code`, deriving satoshis from BTC.
    pub fn rate(&self, code: CurrencyCode) -> Option<f64> {
        match code {
            CurrencyCode::BtcSats => self
                .rates
                .get(&CurrencyCode::Btc)
                .map(|btc| btc * SATS_PER_BTC),
            other => self.rates.get(&other).copied(),
        }
    }

    /// `amount` of `from` expressed in `to`; `None` when either rate is absent.
    pub fn convert(&self, amount: f64, from: CurrencyCode, to: CurrencyCode) -> Option<f64> {
        if from == to {
            return Some(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        Some(amount * (to_rate / from_rate))
    }

    pub fn can_convert(&self, from: CurrencyCode, to: CurrencyCode) -> bool {
        from == to || (self.rate(from).is_some() && self.rate(to).is_some())
    }

    /// Every currency with a known rate, satoshis included when BTC is known.
    pub fn available_currencies(&self) -> Vec<CurrencyCode> {
        let mut codes: Vec<CurrencyCode> = self.rates.keys().copied().collect();
        if self.rates.contains_key(&CurrencyCode::Btc) {
            codes.push(CurrencyCode::BtcSats);
            codes.sort();
        }
        codes
    }

    pub fn iter(&self) -> impl Iterator<Item = (CurrencyCode, f64)> + '_ {
        self.rates.iter().map(|(code, rate)| (*code, *rate))
    }

    /// Number of stored rates, pivot included.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// True when only the pivot is known.
    pub fn is_empty(&self) -> bool {
        self.rates.len() <= 1
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<BTreeMap<CurrencyCode, f64>> for RateTable {
    type Error = String;

    fn try_from(rates: BTreeMap<CurrencyCode, f64>) -> Result<Self, Self::Error> {
        if let Some(pivot) = rates.get(&CurrencyCode::PIVOT) {
            if (pivot - 1.0).abs() > f64::EPSILON {
                return Err(format!("pivot rate must be 1, found {pivot}"));
            }
        }
        Ok(Self::from_rates(rates))
    }
}

impl From<RateTable> for BTreeMap<CurrencyCode, f64> {
    fn from(table: RateTable) -> Self {
        table.rates
    }
}

/// A rate table together with the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rates: RateTable,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn new(rates: RateTable, fetched_at: DateTime<Utc>) -> Self {
        Self { rates, fetched_at }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
    }

    /// True when the snapshot is younger than `max_age` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) < max_age
    }
}
