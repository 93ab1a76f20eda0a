//! The catalog of textual shapes a price can take.
//!
//! Each pattern carries an explicit category and specificity rank; lower
//! ranks are more currency-specific. Priority is a declared property of the
//! entry, so reordering the table below does not change matching results.

use super::currency::{dollar_prefix_regex, CurrencyCode, DOLLAR_PREFIXES};
use crate::error::{PriceScanError, PriceScanResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Numeric body shared by most patterns: digit groups joined by `.` or `,`.
const AMOUNT: &str = r"\d+(?:[.,]\d+)*";

/// Superscript digits used for cents on some storefronts.
const SUPERSCRIPT: &str = "[⁰¹²³⁴⁵⁶⁷⁸⁹]+";

/// Broad family a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    /// Letter-prefixed dollar forms such as `CA$`, `HK$`, `R$`.
    MultiCharDollar,
    /// Integer followed by superscript cents, e.g. `$99⁹⁹`.
    SuperscriptCents,
    /// Regional digit grouping, e.g. Indian `₹1,23,456`.
    RegionalGrouped,
    /// A currency glyph or local abbreviation before or after the amount.
    SymbolFirst,
    /// ISO code before the amount, e.g. `EUR 12.50`.
    CodeFirst,
    /// ISO code after the amount, e.g. `12.50 EUR` or `$5 CAD`.
    CodeSuffixed,
    /// Crypto tickers, the Bitcoin glyph and satoshi amounts.
    CryptoTicker,
}

/// Declarative description of a pattern before compilation.
///
/// `source` may contain the placeholders `{AMT}`, `{SUP}`, `{FIAT}`,
/// `{CRYPTO}` and `{DOLLAR_PREFIX}` which expand to the shared fragments
/// above. `{DOLLAR_PREFIX}` includes the `$` itself.
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub id: &'static str,
    pub category: PatternCategory,
    pub rank: u16,
    pub source: &'static str,
}

const fn spec(
    id: &'static str,
    category: PatternCategory,
    rank: u16,
    source: &'static str,
) -> PatternSpec {
    PatternSpec {
        id,
        category,
        rank,
        source,
    }
}

use PatternCategory::*;

/// The built-in pattern table.
pub const STANDARD_PATTERNS: &[PatternSpec] = &[
    // Letter-prefixed dollars win over the bare `$` on the same span.
    spec("prefixed_dollar", MultiCharDollar, 10, r"\b(?:{DOLLAR_PREFIX})\s*{AMT}"),
    // Superscript cents
    spec("prefixed_superscript", SuperscriptCents, 30, r"\b(?:{DOLLAR_PREFIX})\d+{SUP}"),
    spec("dollar_superscript", SuperscriptCents, 34, r"\$\d+{SUP}"),
    spec("euro_superscript", SuperscriptCents, 35, r"€\d+{SUP}"),
    spec("pound_superscript", SuperscriptCents, 36, r"£\d+{SUP}"),
    // Dollar amount qualified by a trailing code
    spec(
        "dollar_with_code",
        CodeSuffixed,
        40,
        r"\$\s*{AMT}\s+(?:USD|CAD|AUD|NZD|SGD|HKD|MXN|TWD)\b",
    ),
    // Indian lakh grouping
    spec(
        "rupee_lakh",
        RegionalGrouped,
        45,
        r"₹\s*\d{1,2}(?:,\d{2})+,\d{3}(?:\.\d+)?",
    ),
    spec(
        "inr_lakh",
        RegionalGrouped,
        46,
        r"\bINR\s*\d{1,2}(?:,\d{2})+,\d{3}(?:\.\d+)?",
    ),
    // Region-qualified glyphs
    spec("jp_yen", SymbolFirst, 50, r"\bJPY?\s*[¥￥]\s*{AMT}"),
    spec("cn_yuan", SymbolFirst, 51, r"\bCNY?\s*[¥￥]\s*{AMT}"),
    spec("rmb", SymbolFirst, 52, r"\bRMB\s*{AMT}"),
    spec("yuan_prefix", SymbolFirst, 53, r"元\s*{AMT}"),
    spec("yuan_suffix", SymbolFirst, 54, r"{AMT}\s*元"),
    spec("krona_qualified", SymbolFirst, 55, r"\b(?:SEK|NOK|DKK|ISK)\s*kr\.?\s*{AMT}"),
    spec("rupee_rs", SymbolFirst, 56, r"\bRs\.?\s*{AMT}"),
    // Plain glyphs
    spec("dollar", SymbolFirst, 60, r"\$\s*{AMT}"),
    spec("euro", SymbolFirst, 61, r"€\s*{AMT}"),
    spec("euro_suffix", SymbolFirst, 62, r"{AMT}\s*€"),
    spec("pound", SymbolFirst, 63, r"£\s*{AMT}"),
    spec("yen", SymbolFirst, 64, r"[¥￥]\s*{AMT}"),
    spec("rupee", SymbolFirst, 65, r"₹\s*{AMT}"),
    spec("won", SymbolFirst, 66, r"₩\s*{AMT}"),
    spec("lira", SymbolFirst, 67, r"₺\s*{AMT}"),
    spec("shekel", SymbolFirst, 68, r"₪\s*{AMT}"),
    spec("baht", SymbolFirst, 69, r"฿\s*{AMT}"),
    spec("peso", SymbolFirst, 70, r"₱\s*{AMT}"),
    spec("dong_prefix", SymbolFirst, 71, r"₫\s*{AMT}"),
    spec("dong_suffix", SymbolFirst, 72, r"{AMT}\s*₫"),
    spec("ruble_prefix", SymbolFirst, 73, r"₽\s*{AMT}"),
    spec("ruble_suffix", SymbolFirst, 74, r"{AMT}\s*₽"),
    spec("zloty_prefix", SymbolFirst, 75, r"zł\s*{AMT}"),
    spec("zloty_suffix", SymbolFirst, 76, r"{AMT}\s*zł"),
    spec("koruna_suffix", SymbolFirst, 77, r"{AMT}\s*Kč"),
    spec("forint_suffix", SymbolFirst, 78, r"{AMT}\s*Ft\b"),
    spec("rupiah", SymbolFirst, 79, r"\bRp\.?\s*{AMT}"),
    spec("ringgit", SymbolFirst, 80, r"\bRM\s*{AMT}"),
    spec("rand", SymbolFirst, 81, r"\bR\s?{AMT}"),
    spec("krona_prefix", SymbolFirst, 82, r"\bkr\.?\s*{AMT}"),
    spec("krona_suffix", SymbolFirst, 83, r"{AMT}\s*kr\b"),
    // Codes. Leading codes stay upper case; "try 5 times" is not a price.
    spec("code_first", CodeFirst, 90, r"\b(?:{FIAT})\s*{AMT}"),
    spec("code_suffixed", CodeSuffixed, 91, r"\b{AMT}\s*(?i:{FIAT})\b"),
    // Crypto
    spec("bitcoin_glyph", CryptoTicker, 100, r"₿\s*{AMT}"),
    spec("ticker_first", CryptoTicker, 101, r"(?i)\b(?:{CRYPTO})\s+{AMT}"),
    spec("ticker_suffixed", CryptoTicker, 102, r"(?i)\b{AMT}\s+(?:{CRYPTO})\b"),
    spec("satoshis", CryptoTicker, 103, r"(?i)\b{AMT}\s*sats?\b"),
];

/// `|`-joined fiat codes for use inside regexes.
pub(crate) fn fiat_alternation() -> String {
    CurrencyCode::fiat()
        .map(CurrencyCode::code)
        .collect::<Vec<_>>()
        .join("|")
}

/// `|`-joined crypto tickers (the satoshi denomination has no ticker).
pub(crate) fn crypto_alternation() -> String {
    let mut tickers: Vec<&str> = CurrencyCode::crypto()
        .filter(|c| *c != CurrencyCode::BtcSats)
        .map(CurrencyCode::code)
        .collect();
    // Longest first so `TRUMP` is preferred over any shorter prefix.
    tickers.sort_by_key(|t| std::cmp::Reverse(t.len()));
    tickers.join("|")
}

/// `|`-joined letter-prefixed dollar glyphs such as `CA\s*\$` and `C\$`.
pub(crate) fn dollar_prefix_alternation() -> String {
    DOLLAR_PREFIXES
        .iter()
        .map(|(prefix, _)| dollar_prefix_regex(prefix))
        .collect::<Vec<_>>()
        .join("|")
}

fn expand(source: &str) -> String {
    source
        .replace("{DOLLAR_PREFIX}", &dollar_prefix_alternation())
        .replace("{AMT}", AMOUNT)
        .replace("{SUP}", SUPERSCRIPT)
        .replace("{FIAT}", &fiat_alternation())
        .replace("{CRYPTO}", &crypto_alternation())
}

/// A compiled pattern with its declared priority.
#[derive(Debug, Clone)]
pub struct PricePattern {
    pub id: &'static str,
    pub category: PatternCategory,
    pub rank: u16,
    regex: Regex,
}

impl PricePattern {
    pub fn compile(spec: &PatternSpec) -> PriceScanResult<Self> {
        let source = expand(spec.source);
        let regex = Regex::new(&source).map_err(|e| PriceScanError::PatternError {
            pattern: spec.id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            id: spec.id,
            category: spec.category,
            rank: spec.rank,
            regex,
        })
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Ordered, immutable set of price patterns.
#[derive(Debug, Clone)]
pub struct PatternDictionary {
    patterns: Vec<PricePattern>,
}

impl PatternDictionary {
    /// Compiles a dictionary from specs, ordering entries by rank.
    ///
    /// Ties in rank keep their table order.
    pub fn from_specs(specs: &[PatternSpec]) -> PriceScanResult<Self> {
        let mut patterns = specs
            .iter()
            .map(PricePattern::compile)
            .collect::<PriceScanResult<Vec<_>>>()?;
        patterns.sort_by_key(|p| p.rank);
        Ok(Self { patterns })
    }

    /// The built-in dictionary, compiled once per process.
    pub fn standard() -> &'static PatternDictionary {
        static DICTIONARY: Lazy<PatternDictionary> = Lazy::new(|| {
            PatternDictionary::from_specs(STANDARD_PATTERNS).expect("Valid price patterns")
        });
        &DICTIONARY
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PricePattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Patterns of one category, in priority order.
    pub fn by_category(&self, category: PatternCategory) -> impl Iterator<Item = &PricePattern> {
        self.patterns.iter().filter(move |p| p.category == category)
    }
}
