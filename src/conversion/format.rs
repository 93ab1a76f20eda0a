//! Display formatting for converted amounts.

use crate::domain::currency::{CurrencyCode, SATS_PER_BTC};
use serde::{Deserialize, Serialize};

/// Placeholder shown for amounts that cannot be displayed.
pub const INVALID_AMOUNT: &str = "--";

/// How Bitcoin amounts are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BtcDisplay {
    /// Whole BTC with 6 or 8 decimals.
    #[default]
    Native,
    /// Always satoshis.
    Sats,
    /// Satoshis below the threshold, BTC above it.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub btc_display: BtcDisplay,
    /// BTC amounts below this are shown in satoshis in dynamic mode.
    pub dynamic_sats_threshold: f64,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            btc_display: BtcDisplay::Native,
            dynamic_sats_threshold: 0.01,
        }
    }
}

/// Inserts `,` every three digits of the integer part.
pub fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3 + 1);
    grouped.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Fixed-point rendering with thousands separators.
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{value:.decimals$}");
    match fixed.split_once('.') {
        Some((integer, fraction)) => format!("{}.{}", group_thousands(integer), fraction),
        None => group_thousands(&fixed),
    }
}

fn fiat_decimals(amount: f64, currency: CurrencyCode) -> usize {
    if (currency.omits_subunits() && amount > 100.0) || amount >= 1_000_000.0 {
        0
    } else if amount < 1.0 {
        4
    } else {
        2
    }
}

fn crypto_decimals(amount: f64) -> usize {
    if amount >= 1.0 {
        4
    } else if amount >= 0.01 {
        6
    } else {
        8
    }
}

fn btc_native_decimals(amount: f64) -> usize {
    if amount < 0.01 {
        8
    } else {
        6
    }
}

fn format_sats(sats: f64) -> String {
    format!("{} sats", format_number(sats.round(), 0))
}

fn shows_sats(amount: f64, options: &FormatOptions) -> bool {
    match options.btc_display {
        BtcDisplay::Native => false,
        BtcDisplay::Sats => true,
        BtcDisplay::Dynamic => amount < options.dynamic_sats_threshold,
    }
}

/// Formats a bare amount in `currency` without any symbol.
///
/// Satoshi amounts carry a ` sats` suffix. Non-finite or negative amounts
/// render as [`INVALID_AMOUNT`].
pub fn format_amount(amount: f64, currency: CurrencyCode, options: &FormatOptions) -> String {
    if !amount.is_finite() || amount < 0.0 {
        return INVALID_AMOUNT.to_string();
    }

    match currency {
        CurrencyCode::BtcSats => format_sats(amount),
        CurrencyCode::Btc if shows_sats(amount, options) => format_sats(amount * SATS_PER_BTC),
        CurrencyCode::Btc => format_number(amount, btc_native_decimals(amount)),
        crypto if crypto.is_crypto() => format_number(amount, crypto_decimals(amount)),
        fiat => format_number(amount, fiat_decimals(amount, fiat)),
    }
}

/// Formats an amount with its symbol, or its code when it has none.
///
/// `format_display(1234.5, Eur, ..)` yields `€1,234.50`; currencies without a
/// glyph read `BNB 2.5000`.
pub fn format_display(amount: f64, currency: CurrencyCode, options: &FormatOptions) -> String {
    if !amount.is_finite() || amount < 0.0 {
        return format!("{INVALID_AMOUNT} {currency}");
    }

    let number = format_amount(amount, currency, options);
    let in_sats = currency == CurrencyCode::BtcSats
        || (currency == CurrencyCode::Btc && shows_sats(amount, options));
    if in_sats {
        return number;
    }

    match currency.symbol() {
        Some(symbol) => format!("{symbol}{number}"),
        None => format!("{currency} {number}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(amount: f64, currency: CurrencyCode) -> String {
        format_amount(amount, currency, &FormatOptions::default())
    }

    #[test]
    fn test_grouping() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("-1000"), "-1,000");
        assert_eq!(format_number(1234.5, 2), "1,234.50");
    }

    #[test]
    fn test_fiat_precision() {
        assert_eq!(plain(1234.567, CurrencyCode::Usd), "1,234.57");
        assert_eq!(plain(0.5, CurrencyCode::Eur), "0.5000");
        assert_eq!(plain(2_500_000.4, CurrencyCode::Usd), "2,500,000");
        assert_eq!(plain(15_000.4, CurrencyCode::Jpy), "15,000");
        assert_eq!(plain(99.5, CurrencyCode::Jpy), "99.50");
    }

    #[test]
    fn test_crypto_precision() {
        assert_eq!(plain(2.5, CurrencyCode::Eth), "2.5000");
        assert_eq!(plain(0.05, CurrencyCode::Eth), "0.050000");
        assert_eq!(plain(0.00000123, CurrencyCode::Doge), "0.00000123");
    }

    #[test]
    fn test_btc_modes() {
        let native = FormatOptions::default();
        assert_eq!(format_amount(0.5, CurrencyCode::Btc, &native), "0.500000");
        assert_eq!(format_amount(0.001, CurrencyCode::Btc, &native), "0.00100000");

        let sats = FormatOptions {
            btc_display: BtcDisplay::Sats,
            ..FormatOptions::default()
        };
        assert_eq!(format_amount(0.5, CurrencyCode::Btc, &sats), "50,000,000 sats");

        let dynamic = FormatOptions {
            btc_display: BtcDisplay::Dynamic,
            ..FormatOptions::default()
        };
        assert_eq!(format_amount(0.001, CurrencyCode::Btc, &dynamic), "100,000 sats");
        assert_eq!(format_amount(0.5, CurrencyCode::Btc, &dynamic), "0.500000");
        assert_eq!(format_amount(1234.4, CurrencyCode::BtcSats, &native), "1,234 sats");
    }

    #[test]
    fn test_display_forms() {
        let options = FormatOptions::default();
        assert_eq!(format_display(1234.5, CurrencyCode::Eur, &options), "€1,234.50");
        assert_eq!(format_display(2.5, CurrencyCode::Bnb, &options), "BNB 2.5000");
        assert_eq!(format_display(12.0, CurrencyCode::Chf, &options), "Fr12.00");
        assert_eq!(format_display(f64::NAN, CurrencyCode::Gbp, &options), "-- GBP");
        assert_eq!(format_display(500.0, CurrencyCode::BtcSats, &options), "500 sats");
    }
}
