//! Scan orchestration.
//!
//! [`PriceScanner`] wires the detection stages together: candidates from a
//! [`PatternMatcher`], amounts from a [`NumberParser`] and currencies from a
//! [`CurrencyResolver`]. Matches whose amount does not parse or fails the
//! plausibility policy are dropped.

use crate::cache::CacheStats;
use crate::config::Config;
use crate::conversion::{Conversion, ConversionEngine};
use crate::domain::{
    assemble_split_price, CurrencyCode, CurrencyResolver, NumberFormat, NumberParser,
    PageCurrencyDetector, PageDocument, PatternMatcher, PriceMatch, PriceMatcher,
    ResolutionContext, ResolvedBy,
};
use crate::domain::resolver::DEFAULT_CONTEXT_CACHE_CAPACITY;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, warn};

/// A price found in text, with its amount and currency decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPrice {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub amount: f64,
    pub format: NumberFormat,
    pub currency: CurrencyCode,
    pub resolved_by: ResolvedBy,
    pub pattern_id: &'static str,
}

/// Price detection service.
pub struct PriceScanner {
    matcher: Box<dyn PatternMatcher>,
    parser: NumberParser,
    resolver: CurrencyResolver,
}

impl PriceScanner {
    pub fn new(
        matcher: Box<dyn PatternMatcher>,
        parser: NumberParser,
        resolver: CurrencyResolver,
    ) -> Self {
        Self {
            matcher,
            parser,
            resolver,
        }
    }

    /// Scanner with the built-in dictionary and default policies.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(PriceMatcher::new()),
            NumberParser::default(),
            CurrencyResolver::new(),
        )
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Box::new(PriceMatcher::with_capacity(config.match_cache_capacity)),
            NumberParser::new(config.plausibility),
            CurrencyResolver::with_window(
                config.context_window_chars,
                DEFAULT_CONTEXT_CACHE_CAPACITY,
            ),
        )
    }

    pub fn resolver(&self) -> &CurrencyResolver {
        &self.resolver
    }

    /// Every plausible price in `text`, ordered by position.
    pub fn scan(&self, text: &str, context: &ResolutionContext) -> Vec<DetectedPrice> {
        self.matcher
            .find_matches(text)
            .into_iter()
            .filter_map(|m| self.detect(m, context))
            .collect()
    }

    /// Reassembles a price split across groups, e.g. `["$", "99", "99"]`.
    ///
    /// Offsets in the result refer to the assembled string.
    pub fn scan_split(
        &self,
        symbol: &str,
        groups: &[&str],
        context: &ResolutionContext,
    ) -> Option<DetectedPrice> {
        let assembled = assemble_split_price(symbol, groups)?;
        debug!(assembled = %assembled, "Assembled split price");
        self.scan(&assembled, context).into_iter().next()
    }

    pub fn match_cache_stats(&self) -> Option<CacheStats> {
        self.matcher.cache_stats()
    }

    fn detect(&self, found: PriceMatch, context: &ResolutionContext) -> Option<DetectedPrice> {
        let parsed = match self.parser.extract_amount(&found.text) {
            Some(parsed) => parsed,
            None => {
                debug!(text = %found.text, "Dropping match without a readable amount");
                return None;
            }
        };
        if let Some(rejection) = parsed.rejection {
            debug!(text = %found.text, value = parsed.value, ?rejection, "Dropping implausible amount");
            return None;
        }

        let resolution = self.resolver.resolve(&found.text, context);
        debug!(
            text = %found.text,
            currency = %resolution.currency,
            rule = ?resolution.rule,
            "Resolved currency"
        );

        Some(DetectedPrice {
            start: found.start,
            end: found.end,
            text: found.text,
            amount: parsed.value,
            format: parsed.format,
            currency: resolution.currency,
            resolved_by: resolution.rule,
            pattern_id: found.pattern_id,
        })
    }
}

impl Default for PriceScanner {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Per-document scanning state.
///
/// Holds the user's currency preferences and detects the page currency at
/// most once, on first use.
///
/// The page currency only decides matches that carry no glyph or code of
/// their own. Every built-in pattern carries one, so it comes into play with
/// matchers that report bare amounts or when [`ScanSession::context`] is
/// handed to the resolver for text found elsewhere.
pub struct ScanSession<'a> {
    scanner: &'a PriceScanner,
    base_currency: CurrencyCode,
    targets: Vec<CurrencyCode>,
    page: Option<PageDocument>,
    page_currency: OnceCell<Option<CurrencyCode>>,
}

impl<'a> ScanSession<'a> {
    pub fn new(scanner: &'a PriceScanner, base_currency: CurrencyCode) -> Self {
        Self {
            scanner,
            base_currency,
            targets: Vec::new(),
            page: None,
            page_currency: OnceCell::new(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<CurrencyCode>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_page(mut self, page: PageDocument) -> Self {
        self.page = Some(page);
        self
    }

    /// Uses a currency that was already known for the page.
    pub fn with_page_currency(self, currency: CurrencyCode) -> Self {
        let _ = self.page_currency.set(Some(currency));
        self
    }

    pub fn base_currency(&self) -> CurrencyCode {
        self.base_currency
    }

    pub fn targets(&self) -> &[CurrencyCode] {
        &self.targets
    }

    pub fn page_currency(&self) -> Option<CurrencyCode> {
        *self.page_currency.get_or_init(|| {
            let detected = self
                .page
                .as_ref()
                .and_then(|page| PageCurrencyDetector::new().detect(page));
            debug!(?detected, "Page currency detection finished");
            detected
        })
    }

    /// The resolution hints for a match, optionally with surrounding text.
    pub fn context(&self, nearby: Option<&str>) -> ResolutionContext {
        let mut context = ResolutionContext::new().with_base_currency(self.base_currency);
        if let Some(currency) = self.page_currency() {
            context = context.with_page_currency(currency);
        }
        if let Some(text) = nearby {
            context = context.with_nearby_text(text);
        }
        context
    }

    pub fn scan(&self, text: &str) -> Vec<DetectedPrice> {
        self.scanner.scan(text, &self.context(None))
    }

    pub fn scan_with_nearby(&self, text: &str, nearby: &str) -> Vec<DetectedPrice> {
        self.scanner.scan(text, &self.context(Some(nearby)))
    }

    pub fn scan_split(&self, symbol: &str, groups: &[&str]) -> Option<DetectedPrice> {
        self.scanner.scan_split(symbol, groups, &self.context(None))
    }

    /// The session's conversion list for one detected price.
    pub fn conversions(&self, engine: &ConversionEngine, price: &DetectedPrice) -> Vec<Conversion> {
        let list = engine.conversions(price.amount, price.currency, &self.targets);
        for target in &self.targets {
            if !list.iter().any(|c| c.currency == *target) {
                warn!(from = %price.currency, to = %target, "No rate available for conversion");
            }
        }
        list
    }
}
