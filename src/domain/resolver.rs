//! Currency resolution for matched price text.
//!
//! Resolution never fails. Rules are tried in a fixed order and the first
//! one that recognises the text wins:
//!
//! 1. letter-prefixed dollar and yen forms (`CA$`, `HK$`, `JP¥`, `SEKkr`)
//! 2. regional notation (`R 100`, `Rs.`, `RMB`, `元`, `NOK kr`)
//! 3. crypto tickers, `₿` and satoshi amounts
//! 4. ISO codes
//! 5. rules 1 to 4 over a bounded window of nearby text, where codes and
//!    tickers only count in upper case
//! 6. single glyphs, with shared glyphs narrowed by the base currency
//! 7. the page currency
//! 8. the base currency

use super::currency::{dollar_prefix_regex, CurrencyCode, SharedGlyph, DOLLAR_PREFIXES};
use super::patterns::{crypto_alternation, fiat_alternation};
use crate::cache::{BoundedCache, CacheStats};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Mutex;

/// Default character budget for the nearby-text window.
pub const DEFAULT_CONTEXT_WINDOW: usize = 200;

/// Default number of nearby-text windows memoized.
pub const DEFAULT_CONTEXT_CACHE_CAPACITY: usize = 500;

/// Optional hints supplied alongside a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    pub nearby_text: Option<String>,
    pub page_currency: Option<CurrencyCode>,
    pub user_base_currency: Option<CurrencyCode>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nearby_text(mut self, text: impl Into<String>) -> Self {
        self.nearby_text = Some(text.into());
        self
    }

    pub fn with_page_currency(mut self, currency: CurrencyCode) -> Self {
        self.page_currency = Some(currency);
        self
    }

    pub fn with_base_currency(mut self, currency: CurrencyCode) -> Self {
        self.user_base_currency = Some(currency);
        self
    }

    /// The base currency, falling back to the pivot.
    pub fn base_currency(&self) -> CurrencyCode {
        self.user_base_currency.unwrap_or(CurrencyCode::PIVOT)
    }
}

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    MultiCharSymbol,
    RegionalNotation,
    Crypto,
    IsoCode,
    NearbyText,
    Symbol,
    PageCurrency,
    BaseCurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub currency: CurrencyCode,
    pub rule: ResolvedBy,
}

/// Where the text handed to the explicit rules came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// The matched price itself; codes and tickers match in any case.
    Matched,
    /// Surrounding prose, where `eth` or `Trump` are ordinary words.
    Nearby,
}

#[derive(Debug, Clone, Copy)]
enum GlyphTarget {
    Fixed(CurrencyCode),
    Shared(SharedGlyph),
}

/// Builds a regex that only matches when `prefix` is not glued to a
/// preceding letter, so `CA$` does not fire inside `CAD$`.
fn prefixed(prefix: &str) -> Regex {
    Regex::new(&format!(r"(?:^|[^A-Za-z]){prefix}")).expect("Valid prefix regex")
}

static MULTI_CHAR_PREFIXES: Lazy<Vec<(Regex, CurrencyCode)>> = Lazy::new(|| {
    use CurrencyCode::*;
    let dollars = DOLLAR_PREFIXES
        .iter()
        .map(|(prefix, code)| (dollar_prefix_regex(prefix), *code));
    let others = [
        (r"JP[¥￥]", Jpy),
        (r"CN[¥￥]", Cny),
        (r"SEKkr", Sek),
        (r"NOKkr", Nok),
        (r"DKKkr", Dkk),
        (r"ISKkr", Isk),
    ]
    .into_iter()
    .map(|(prefix, code)| (prefix.to_string(), code));
    dollars
        .chain(others)
        .map(|(prefix, code)| (prefixed(&prefix), code))
        .collect()
});

static REGIONAL_NOTATION: Lazy<Vec<(Regex, CurrencyCode)>> = Lazy::new(|| {
    use CurrencyCode::*;
    [
        (prefixed(r"JPY?\s*[¥￥]"), Jpy),
        (prefixed(r"CNY?\s*[¥￥]"), Cny),
        (prefixed(r"RMB"), Cny),
        (Regex::new("元").expect("Valid yuan regex"), Cny),
        (prefixed(r"SEK\s*kr"), Sek),
        (prefixed(r"NOK\s*kr"), Nok),
        (prefixed(r"DKK\s*kr"), Dkk),
        (prefixed(r"ISK\s*kr"), Isk),
        (prefixed(r"Rs\.?\s*\d"), Inr),
        (prefixed(r"Rp\.?\s*\d"), Idr),
        (prefixed(r"RM\s*\d"), Myr),
        (prefixed(r"R\s?\d"), Zar),
    ]
    .into_iter()
    .collect()
});

fn satoshi_amount() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\d\s*sats?\b").expect("Valid satoshi regex"));
    &PATTERN
}

fn crypto_ticker(scope: Scope) -> &'static Regex {
    static ANY_CASE: Lazy<Regex> = Lazy::new(|| ticker_regex("(?i)"));
    static UPPER_CASE: Lazy<Regex> = Lazy::new(|| ticker_regex(""));
    match scope {
        Scope::Matched => &ANY_CASE,
        Scope::Nearby => &UPPER_CASE,
    }
}

fn ticker_regex(flags: &str) -> Regex {
    Regex::new(&format!(
        r"{flags}(?:^|[^A-Za-z])({})(?:[^A-Za-z]|$)",
        crypto_alternation()
    ))
    .expect("Valid ticker regex")
}

fn iso_code(scope: Scope) -> &'static Regex {
    static ANY_CASE: Lazy<Regex> = Lazy::new(|| iso_regex("(?i)"));
    static UPPER_CASE: Lazy<Regex> = Lazy::new(|| iso_regex(""));
    match scope {
        Scope::Matched => &ANY_CASE,
        Scope::Nearby => &UPPER_CASE,
    }
}

fn iso_regex(flags: &str) -> Regex {
    Regex::new(&format!(
        r"{flags}(?:^|[^A-Za-z])({}|RMB)(?:kr|[^A-Za-z]|$)",
        fiat_alternation()
    ))
    .expect("Valid ISO code regex")
}

/// Glyph table; `$` comes last so any more specific glyph wins.
const GLYPHS: &[(&str, GlyphTarget)] = &[
    ("€", GlyphTarget::Fixed(CurrencyCode::Eur)),
    ("£", GlyphTarget::Fixed(CurrencyCode::Gbp)),
    ("¥", GlyphTarget::Shared(SharedGlyph::Yen)),
    ("￥", GlyphTarget::Shared(SharedGlyph::Yen)),
    ("₹", GlyphTarget::Fixed(CurrencyCode::Inr)),
    ("₩", GlyphTarget::Fixed(CurrencyCode::Krw)),
    ("₺", GlyphTarget::Fixed(CurrencyCode::Try)),
    ("₪", GlyphTarget::Fixed(CurrencyCode::Ils)),
    ("฿", GlyphTarget::Fixed(CurrencyCode::Thb)),
    ("₱", GlyphTarget::Fixed(CurrencyCode::Php)),
    ("₫", GlyphTarget::Fixed(CurrencyCode::Vnd)),
    ("₽", GlyphTarget::Fixed(CurrencyCode::Rub)),
    ("zł", GlyphTarget::Fixed(CurrencyCode::Pln)),
    ("Kč", GlyphTarget::Fixed(CurrencyCode::Czk)),
    ("Ft", GlyphTarget::Fixed(CurrencyCode::Huf)),
    ("lei", GlyphTarget::Fixed(CurrencyCode::Ron)),
    ("лв", GlyphTarget::Fixed(CurrencyCode::Bgn)),
    ("kr", GlyphTarget::Shared(SharedGlyph::Krona)),
    ("$", GlyphTarget::Shared(SharedGlyph::Dollar)),
];

/// Rules 1 to 4: signals carried by the text itself.
fn explicit_currency(text: &str, scope: Scope) -> Option<Resolution> {
    let found = |currency, rule| Some(Resolution { currency, rule });

    if let Some((_, code)) = MULTI_CHAR_PREFIXES.iter().find(|(re, _)| re.is_match(text)) {
        return found(*code, ResolvedBy::MultiCharSymbol);
    }
    if let Some((_, code)) = REGIONAL_NOTATION.iter().find(|(re, _)| re.is_match(text)) {
        return found(*code, ResolvedBy::RegionalNotation);
    }
    if text.contains('₿') {
        return found(CurrencyCode::Btc, ResolvedBy::Crypto);
    }
    if satoshi_amount().is_match(text) {
        return found(CurrencyCode::BtcSats, ResolvedBy::Crypto);
    }
    if let Some(code) = crypto_ticker(scope)
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| CurrencyCode::from_code(m.as_str()))
    {
        return found(code, ResolvedBy::Crypto);
    }
    if let Some(token) = iso_code(scope).captures(text).and_then(|caps| caps.get(1)) {
        let code = match token.as_str().to_ascii_uppercase().as_str() {
            "RMB" => Some(CurrencyCode::Cny),
            other => CurrencyCode::from_code(other),
        };
        if let Some(code) = code {
            return found(code, ResolvedBy::IsoCode);
        }
    }
    None
}

fn glyph_currency(text: &str, base: CurrencyCode) -> Option<CurrencyCode> {
    GLYPHS
        .iter()
        .find(|(glyph, _)| text.contains(glyph))
        .map(|(_, target)| match *target {
            GlyphTarget::Fixed(code) => code,
            GlyphTarget::Shared(glyph) if base.uses_glyph(glyph) => base,
            GlyphTarget::Shared(glyph) => glyph.default_currency(),
        })
}

/// Slice of `nearby` of at most `budget` characters, centred on `matched`
/// when it occurs there.
pub fn context_window(nearby: &str, matched: &str, budget: usize) -> String {
    let position = if matched.is_empty() {
        None
    } else {
        nearby.find(matched)
    };

    match position {
        Some(start) => {
            let end = start + matched.len();
            let side = budget.saturating_sub(matched.chars().count()) / 2;
            let before: Vec<char> = nearby[..start].chars().rev().take(side).collect();
            let after = nearby[end..].chars().take(side);
            before
                .into_iter()
                .rev()
                .chain(matched.chars())
                .chain(after)
                .collect()
        }
        None => nearby.chars().take(budget).collect(),
    }
}

/// Determines which currency a matched price is denominated in.
#[derive(Debug)]
pub struct CurrencyResolver {
    window_chars: usize,
    context_cache: Mutex<BoundedCache<String, Option<Resolution>>>,
}

impl CurrencyResolver {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_CONTEXT_WINDOW, DEFAULT_CONTEXT_CACHE_CAPACITY)
    }

    pub fn with_window(window_chars: usize, cache_capacity: usize) -> Self {
        Self {
            window_chars,
            context_cache: Mutex::new(BoundedCache::new(cache_capacity)),
        }
    }

    /// Resolves the currency of `matched`; never fails.
    pub fn resolve_currency(&self, matched: &str, context: &ResolutionContext) -> CurrencyCode {
        self.resolve(matched, context).currency
    }

    /// Resolves the currency and reports which rule decided it.
    pub fn resolve(&self, matched: &str, context: &ResolutionContext) -> Resolution {
        if let Some(resolution) = explicit_currency(matched, Scope::Matched) {
            return resolution;
        }

        if let Some(nearby) = context.nearby_text.as_deref() {
            if let Some(resolution) = self.nearby_currency(nearby, matched) {
                return Resolution {
                    currency: resolution.currency,
                    rule: ResolvedBy::NearbyText,
                };
            }
        }

        let base = context.base_currency();
        if let Some(currency) = glyph_currency(matched, base) {
            return Resolution {
                currency,
                rule: ResolvedBy::Symbol,
            };
        }

        if let Some(currency) = context.page_currency {
            return Resolution {
                currency,
                rule: ResolvedBy::PageCurrency,
            };
        }

        Resolution {
            currency: base,
            rule: ResolvedBy::BaseCurrency,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.context_cache
            .lock()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    fn nearby_currency(&self, nearby: &str, matched: &str) -> Option<Resolution> {
        let window = context_window(nearby, matched, self.window_chars);
        if window.trim().is_empty() {
            return None;
        }

        if let Ok(mut cache) = self.context_cache.lock() {
            if let Some(hit) = cache.get(&window) {
                return hit;
            }
        }

        let resolution = explicit_currency(&window, Scope::Nearby);
        if let Ok(mut cache) = self.context_cache.lock() {
            cache.insert(window, resolution);
        }
        resolution
    }
}

impl Default for CurrencyResolver {
    fn default() -> Self {
        Self::new()
    }
}
