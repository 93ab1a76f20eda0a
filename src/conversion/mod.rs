//! Cross-currency conversion and display.
//!
//! The engine borrows an immutable [`RateTable`] snapshot. A refresh swaps in
//! a new `Arc`, so a conversion racing an update sees either the old or the
//! new table in full.

pub mod format;
pub mod rates;

pub use format::{format_amount, format_display, BtcDisplay, FormatOptions};
pub use rates::{RateSnapshot, RateTable};

use crate::domain::currency::CurrencyCode;
use serde::Serialize;
use std::sync::Arc;

/// One entry of a conversion list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub currency: CurrencyCode,
    pub amount: f64,
    pub formatted: String,
}

#[derive(Debug, Clone)]
pub struct ConversionEngine {
    rates: Arc<RateTable>,
    options: FormatOptions,
}

impl ConversionEngine {
    pub fn new(rates: Arc<RateTable>) -> Self {
        Self::with_options(rates, FormatOptions::default())
    }

    pub fn with_options(rates: Arc<RateTable>, options: FormatOptions) -> Self {
        Self { rates, options }
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Converts via the pivot; `None` when a rate is missing.
    pub fn convert(&self, amount: f64, from: CurrencyCode, to: CurrencyCode) -> Option<f64> {
        self.rates.convert(amount, from, to)
    }

    pub fn can_convert(&self, from: CurrencyCode, to: CurrencyCode) -> bool {
        self.rates.can_convert(from, to)
    }

    pub fn available_currencies(&self) -> Vec<CurrencyCode> {
        self.rates.available_currencies()
    }

    /// Formats `amount` with its symbol according to the engine options.
    pub fn format(&self, amount: f64, currency: CurrencyCode) -> String {
        format_display(amount, currency, &self.options)
    }

    /// The source amount followed by its value in each target.
    ///
    /// Targets equal to the source, repeated targets and targets without a
    /// rate are skipped; the remaining order follows `targets`.
    pub fn conversions(
        &self,
        amount: f64,
        from: CurrencyCode,
        targets: &[CurrencyCode],
    ) -> Vec<Conversion> {
        let mut list = vec![Conversion {
            currency: from,
            amount,
            formatted: self.format(amount, from),
        }];

        for &target in targets {
            if list.iter().any(|c| c.currency == target) {
                continue;
            }
            if let Some(converted) = self.convert(amount, from, target) {
                list.push(Conversion {
                    currency: target,
                    amount: converted,
                    formatted: self.format(converted, target),
                });
            }
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ConversionEngine {
        ConversionEngine::new(Arc::new(RateTable::from_rates([
            (CurrencyCode::Eur, 0.9),
            (CurrencyCode::Gbp, 0.8),
            (CurrencyCode::Btc, 0.00001),
        ])))
    }

    #[test]
    fn test_conversion_list_order_and_skips() {
        let list = engine().conversions(
            10.0,
            CurrencyCode::Eur,
            &[CurrencyCode::Usd, CurrencyCode::Eur, CurrencyCode::Jpy, CurrencyCode::Gbp],
        );
        let currencies: Vec<CurrencyCode> = list.iter().map(|c| c.currency).collect();
        assert_eq!(
            currencies,
            vec![CurrencyCode::Eur, CurrencyCode::Usd, CurrencyCode::Gbp]
        );
        assert_eq!(list[0].formatted, "€10.00");
        assert_eq!(list[1].formatted, "$11.11");
    }

    #[test]
    fn test_round_trip() {
        let engine = engine();
        let gbp = engine.convert(123.45, CurrencyCode::Eur, CurrencyCode::Gbp).unwrap();
        let back = engine.convert(gbp, CurrencyCode::Gbp, CurrencyCode::Eur).unwrap();
        assert!((back - 123.45).abs() < 1e-9);
    }

    #[test]
    fn test_btc_display_option() {
        let engine = ConversionEngine::with_options(
            Arc::new(RateTable::from_rates([(CurrencyCode::Btc, 0.00001)])),
            FormatOptions {
                btc_display: BtcDisplay::Sats,
                ..FormatOptions::default()
            },
        );
        let list = engine.conversions(10.0, CurrencyCode::Usd, &[CurrencyCode::Btc]);
        assert_eq!(list[1].formatted, "10,000 sats");
    }
}
