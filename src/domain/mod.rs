//! Price detection and normalization.
//!
//! Detection is synchronous and pure over its inputs: the pattern
//! dictionary is compiled once, and the only shared state is the bounded
//! memoization inside [`PriceMatcher`] and [`CurrencyResolver`].

pub mod amount;
pub mod currency;
pub mod matcher;
pub mod page;
pub mod patterns;
pub mod resolver;
pub mod split;

pub use amount::{
    extract_amount, NumberFormat, NumberParser, ParsedAmount, PlausibilityPolicy, Rejection,
};
pub use currency::{CurrencyCode, CurrencyKind, SharedGlyph, SATS_PER_BTC};
pub use matcher::{PriceMatch, PriceMatcher};
pub use page::{MetaTag, PageCurrencyDetector, PageDocument};
pub use patterns::{PatternCategory, PatternDictionary, PatternSpec, PricePattern};
pub use resolver::{CurrencyResolver, Resolution, ResolutionContext, ResolvedBy};
pub use split::{assemble_split_price, is_symbol_only};

use crate::cache::CacheStats;

/// Trait for price candidate detection strategies.
pub trait PatternMatcher: Send + Sync {
    /// Returns non-overlapping candidates ordered by position.
    fn find_matches(&self, text: &str) -> Vec<PriceMatch>;

    fn contains_price(&self, text: &str) -> bool {
        !self.find_matches(text).is_empty()
    }

    /// Memoization counters, for matchers that cache.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}
