//! Supported currency codes and their display metadata.
//!
//! The catalog is closed: fiat ISO codes, crypto tickers and one synthetic
//! code for Bitcoin amounts expressed in satoshis. Everything downstream
//! dispatches on [`CurrencyCode`] rather than on raw strings.

use crate::error::PriceScanError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Satoshis per bitcoin.
pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Whether a currency is a government-issued currency or a crypto asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

macro_rules! currency_catalog {
    ($( $variant:ident => ($code:literal, $kind:ident, $name:literal, $symbol:expr) ),+ $(,)?) => {
        /// A currency the scanner can detect and convert.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum CurrencyCode {
            $( $variant, )+
        }

        impl CurrencyCode {
            /// Every supported code in catalog order.
            pub const ALL: &'static [CurrencyCode] = &[ $( CurrencyCode::$variant, )+ ];

            /// Canonical upper-case code, e.g. `"USD"` or `"BTC_SATS"`.
            pub const fn code(self) -> &'static str {
                match self { $( CurrencyCode::$variant => $code, )+ }
            }

            /// Human-readable name.
            pub const fn name(self) -> &'static str {
                match self { $( CurrencyCode::$variant => $name, )+ }
            }

            pub const fn kind(self) -> CurrencyKind {
                match self { $( CurrencyCode::$variant => CurrencyKind::$kind, )+ }
            }

            /// Display symbol, if the currency has a conventional one.
            pub const fn symbol(self) -> Option<&'static str> {
                match self { $( CurrencyCode::$variant => $symbol, )+ }
            }
        }
    };
}

currency_catalog! {
    Aud => ("AUD", Fiat, "Australian Dollar", Some("A$")),
    Bgn => ("BGN", Fiat, "Bulgarian Lev", Some("лв")),
    Brl => ("BRL", Fiat, "Brazilian Real", Some("R$")),
    Cad => ("CAD", Fiat, "Canadian Dollar", Some("C$")),
    Chf => ("CHF", Fiat, "Swiss Franc", Some("Fr")),
    Cny => ("CNY", Fiat, "Chinese Renminbi Yuan", Some("¥")),
    Czk => ("CZK", Fiat, "Czech Koruna", Some("Kč")),
    Dkk => ("DKK", Fiat, "Danish Krone", Some("kr")),
    Eur => ("EUR", Fiat, "Euro", Some("€")),
    Gbp => ("GBP", Fiat, "British Pound", Some("£")),
    Hkd => ("HKD", Fiat, "Hong Kong Dollar", Some("HK$")),
    Huf => ("HUF", Fiat, "Hungarian Forint", Some("Ft")),
    Idr => ("IDR", Fiat, "Indonesian Rupiah", Some("Rp")),
    Ils => ("ILS", Fiat, "Israeli New Sheqel", Some("₪")),
    Inr => ("INR", Fiat, "Indian Rupee", Some("₹")),
    Isk => ("ISK", Fiat, "Icelandic Króna", Some("kr")),
    Jpy => ("JPY", Fiat, "Japanese Yen", Some("¥")),
    Krw => ("KRW", Fiat, "South Korean Won", Some("₩")),
    Mxn => ("MXN", Fiat, "Mexican Peso", Some("$")),
    Myr => ("MYR", Fiat, "Malaysian Ringgit", Some("RM")),
    Nok => ("NOK", Fiat, "Norwegian Krone", Some("kr")),
    Nzd => ("NZD", Fiat, "New Zealand Dollar", Some("NZ$")),
    Php => ("PHP", Fiat, "Philippine Peso", Some("₱")),
    Pln => ("PLN", Fiat, "Polish Złoty", Some("zł")),
    Ron => ("RON", Fiat, "Romanian Leu", Some("lei")),
    Rub => ("RUB", Fiat, "Russian Ruble", Some("₽")),
    Sek => ("SEK", Fiat, "Swedish Krona", Some("kr")),
    Sgd => ("SGD", Fiat, "Singapore Dollar", Some("S$")),
    Thb => ("THB", Fiat, "Thai Baht", Some("฿")),
    Try => ("TRY", Fiat, "Turkish Lira", Some("₺")),
    Twd => ("TWD", Fiat, "New Taiwan Dollar", Some("NT$")),
    Usd => ("USD", Fiat, "United States Dollar", Some("$")),
    Vnd => ("VND", Fiat, "Vietnamese Dong", Some("₫")),
    Zar => ("ZAR", Fiat, "South African Rand", Some("R")),
    Btc => ("BTC", Crypto, "Bitcoin", Some("₿")),
    BtcSats => ("BTC_SATS", Crypto, "BTC (SATS)", None),
    Eth => ("ETH", Crypto, "Ethereum", Some("Ξ")),
    Bnb => ("BNB", Crypto, "Binance Coin", None),
    Xrp => ("XRP", Crypto, "Ripple", None),
    Sol => ("SOL", Crypto, "Solana", None),
    Doge => ("DOGE", Crypto, "Dogecoin", Some("Ð")),
    Trx => ("TRX", Crypto, "TRON", None),
    Ada => ("ADA", Crypto, "Cardano", Some("₳")),
    Bch => ("BCH", Crypto, "Bitcoin Cash", None),
    Xlm => ("XLM", Crypto, "Stellar", None),
    Ltc => ("LTC", Crypto, "Litecoin", Some("Ł")),
    Dot => ("DOT", Crypto, "Polkadot", None),
    Xmr => ("XMR", Crypto, "Monero", Some("ɱ")),
    Pepe => ("PEPE", Crypto, "Pepe", None),
    Aave => ("AAVE", Crypto, "Aave", None),
    Pi => ("PI", Crypto, "Pi", None),
    Cro => ("CRO", Crypto, "Cronos", None),
    Trump => ("TRUMP", Crypto, "Official Trump", None),
    Vet => ("VET", Crypto, "VeChain", None),
    Render => ("RENDER", Crypto, "Render", None),
    Wld => ("WLD", Crypto, "Worldcoin", None),
}

/// CoinGecko asset identifiers for each crypto ticker.
const COINGECKO_IDS: &[(&str, CurrencyCode)] = &[
    ("bitcoin", CurrencyCode::Btc),
    ("ethereum", CurrencyCode::Eth),
    ("binancecoin", CurrencyCode::Bnb),
    ("ripple", CurrencyCode::Xrp),
    ("solana", CurrencyCode::Sol),
    ("dogecoin", CurrencyCode::Doge),
    ("tron", CurrencyCode::Trx),
    ("cardano", CurrencyCode::Ada),
    ("bitcoin-cash", CurrencyCode::Bch),
    ("stellar", CurrencyCode::Xlm),
    ("litecoin", CurrencyCode::Ltc),
    ("polkadot", CurrencyCode::Dot),
    ("monero", CurrencyCode::Xmr),
    ("pepe", CurrencyCode::Pepe),
    ("aave", CurrencyCode::Aave),
    ("pi-network", CurrencyCode::Pi),
    ("cronos", CurrencyCode::Cro),
    ("official-trump", CurrencyCode::Trump),
    ("vechain", CurrencyCode::Vet),
    ("render-token", CurrencyCode::Render),
    ("worldcoin-wld", CurrencyCode::Wld),
];

/// Currencies written with a bare `$`.
const DOLLAR_FAMILY: &[CurrencyCode] = &[
    CurrencyCode::Usd,
    CurrencyCode::Cad,
    CurrencyCode::Aud,
    CurrencyCode::Nzd,
    CurrencyCode::Hkd,
    CurrencyCode::Sgd,
    CurrencyCode::Twd,
    CurrencyCode::Mxn,
];

/// Letter prefixes that narrow `$` to one currency, longest first.
///
/// Detection and resolution both read this table, so a prefix the matcher
/// finds is always one the resolver can name.
pub const DOLLAR_PREFIXES: &[(&str, CurrencyCode)] = &[
    ("CAD", CurrencyCode::Cad),
    ("AUD", CurrencyCode::Aud),
    ("NZD", CurrencyCode::Nzd),
    ("HKD", CurrencyCode::Hkd),
    ("SGD", CurrencyCode::Sgd),
    ("CA", CurrencyCode::Cad),
    ("AU", CurrencyCode::Aud),
    ("NZ", CurrencyCode::Nzd),
    ("HK", CurrencyCode::Hkd),
    ("SG", CurrencyCode::Sgd),
    ("US", CurrencyCode::Usd),
    ("NT", CurrencyCode::Twd),
    ("MX", CurrencyCode::Mxn),
    ("C", CurrencyCode::Cad),
    ("A", CurrencyCode::Aud),
    ("S", CurrencyCode::Sgd),
    ("R", CurrencyCode::Brl),
];

/// Regex fragment for a prefix and its `$`. Single letters must touch the glyph.
pub(crate) fn dollar_prefix_regex(prefix: &str) -> String {
    if prefix.len() > 1 {
        format!(r"{prefix}\s*\$")
    } else {
        format!(r"{prefix}\$")
    }
}

/// Currencies written with a bare `¥`.
const YEN_FAMILY: &[CurrencyCode] = &[CurrencyCode::Jpy, CurrencyCode::Cny];

/// Currencies written with a bare `kr`.
const KRONA_FAMILY: &[CurrencyCode] = &[
    CurrencyCode::Sek,
    CurrencyCode::Nok,
    CurrencyCode::Dkk,
    CurrencyCode::Isk,
];

/// A glyph shared by several currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedGlyph {
    Dollar,
    Yen,
    Krona,
}

impl SharedGlyph {
    /// Currencies that are written with this glyph.
    pub fn family(self) -> &'static [CurrencyCode] {
        match self {
            Self::Dollar => DOLLAR_FAMILY,
            Self::Yen => YEN_FAMILY,
            Self::Krona => KRONA_FAMILY,
        }
    }

    /// Currency assumed when no hint narrows the family down.
    pub fn default_currency(self) -> CurrencyCode {
        match self {
            Self::Dollar => CurrencyCode::Usd,
            Self::Yen => CurrencyCode::Jpy,
            Self::Krona => CurrencyCode::Sek,
        }
    }
}

impl CurrencyCode {
    /// The pivot unit every rate is expressed against.
    pub const PIVOT: CurrencyCode = CurrencyCode::Usd;

    /// Looks up a code case-insensitively. `"SATS"` is accepted for `BTC_SATS`.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.eq_ignore_ascii_case("SATS") {
            return Some(Self::BtcSats);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }

    /// Maps a CoinGecko asset id to its ticker.
    pub fn from_coingecko_id(id: &str) -> Option<Self> {
        COINGECKO_IDS
            .iter()
            .find(|(asset, _)| *asset == id)
            .map(|(_, code)| *code)
    }

    /// CoinGecko asset id for crypto tickers that have one.
    pub fn coingecko_id(self) -> Option<&'static str> {
        COINGECKO_IDS
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(asset, _)| *asset)
    }

    /// All CoinGecko asset ids, comma separated, as the upstream expects them.
    pub fn coingecko_id_list() -> String {
        COINGECKO_IDS
            .iter()
            .map(|(asset, _)| *asset)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_crypto(self) -> bool {
        self.kind() == CurrencyKind::Crypto
    }

    pub fn is_fiat(self) -> bool {
        self.kind() == CurrencyKind::Fiat
    }

    /// Currencies whose everyday prices omit the minor unit.
    pub fn omits_subunits(self) -> bool {
        matches!(self, Self::Jpy | Self::Krw | Self::Idr | Self::Vnd)
    }

    /// Returns true if this currency is written with the given shared glyph.
    pub fn uses_glyph(self, glyph: SharedGlyph) -> bool {
        glyph.family().contains(&self)
    }

    /// Supported fiat codes.
    pub fn fiat() -> impl Iterator<Item = CurrencyCode> {
        Self::ALL.iter().copied().filter(|c| c.is_fiat())
    }

    /// Supported crypto codes, including the satoshi denomination.
    pub fn crypto() -> impl Iterator<Item = CurrencyCode> {
        Self::ALL.iter().copied().filter(|c| c.is_crypto())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| PriceScanError::UnknownCurrency(s.to_string()))
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_code(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown currency code '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(CurrencyCode::from_code("eur"), Some(CurrencyCode::Eur));
        assert_eq!(CurrencyCode::from_code(" Btc "), Some(CurrencyCode::Btc));
        assert_eq!(CurrencyCode::from_code("btc_sats"), Some(CurrencyCode::BtcSats));
        assert_eq!(CurrencyCode::from_code("sats"), Some(CurrencyCode::BtcSats));
        assert_eq!(CurrencyCode::from_code("XYZ"), None);
    }

    #[test]
    fn test_catalog_split() {
        assert!(CurrencyCode::fiat().count() >= 30);
        assert!(CurrencyCode::crypto().count() >= 20);
        assert!(CurrencyCode::BtcSats.is_crypto());
        assert!(CurrencyCode::Usd.is_fiat());
    }

    #[test]
    fn test_coingecko_mapping() {
        assert_eq!(
            CurrencyCode::from_coingecko_id("bitcoin-cash"),
            Some(CurrencyCode::Bch)
        );
        assert_eq!(CurrencyCode::Wld.coingecko_id(), Some("worldcoin-wld"));
        assert_eq!(CurrencyCode::BtcSats.coingecko_id(), None);
        assert!(CurrencyCode::coingecko_id_list().starts_with("bitcoin,ethereum"));
    }

    #[test]
    fn test_shared_glyphs() {
        assert!(CurrencyCode::Cad.uses_glyph(SharedGlyph::Dollar));
        assert!(CurrencyCode::Cny.uses_glyph(SharedGlyph::Yen));
        assert!(!CurrencyCode::Eur.uses_glyph(SharedGlyph::Krona));
        assert_eq!(SharedGlyph::Krona.default_currency(), CurrencyCode::Sek);
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&CurrencyCode::BtcSats).unwrap();
        assert_eq!(json, "\"BTC_SATS\"");
        let parsed: CurrencyCode = serde_json::from_str("\"jpy\"").unwrap();
        assert_eq!(parsed, CurrencyCode::Jpy);
        assert!(serde_json::from_str::<CurrencyCode>("\"ABC\"").is_err());
    }
}
