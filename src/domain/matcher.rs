//! Price candidate detection over free text.
//!
//! Every dictionary pattern is run against the input. Raw matches are then
//! accepted greedily, most specific first, and a candidate is kept only when
//! it shares no characters with one already accepted. Overlaps are judged
//! pairwise, so two adjacent prices linked through a third reading both
//! survive.
//!
//! A currency marker sitting between two amounts, as in `€10 €20` or
//! `100 kr 200 kr`, is given to the amount that has no other marker before
//! the greedy pass runs.

use super::patterns::{crypto_alternation, fiat_alternation, PatternCategory, PatternDictionary};
use super::PatternMatcher;
use crate::cache::{BoundedCache, CacheStats};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::{Arc, Mutex};

/// Default number of distinct texts whose matches are memoized.
pub const DEFAULT_MATCH_CACHE_CAPACITY: usize = 1000;

/// Glyphs and local abbreviations that count as an explicit currency symbol.
const SYMBOLS: &[&str] = &[
    "$", "€", "£", "¥", "￥", "₹", "₩", "₺", "₪", "฿", "₱", "₫", "₽", "₿", "元", "zł", "Kč", "kr",
];

/// A price candidate located in the source text.
///
/// `start` and `end` are byte offsets forming a half-open span, so
/// `&source[start..end] == text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub pattern_id: &'static str,
    pub category: PatternCategory,
    pub rank: u16,
}

impl PriceMatch {
    pub fn overlaps(&self, other: &PriceMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

fn code_token() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(
            r"(?i)(?:^|[^A-Za-z])(?:{}|RMB|{})(?:kr|[^A-Za-z]|$)",
            fiat_alternation(),
            crypto_alternation()
        ))
        .expect("Valid currency code regex")
    });
    &PATTERN
}

fn marker_alternation() -> String {
    let symbols: Vec<String> = SYMBOLS.iter().map(|s| regex::escape(s)).collect();
    symbols.join("|")
}

/// A currency marker ending the text, optionally followed by whitespace.
fn marker_behind() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(
            r"(?:{}|(?:^|[^A-Za-z])(?:{}|RMB|(?i:{}|sats?)))\s*$",
            marker_alternation(),
            fiat_alternation(),
            crypto_alternation()
        ))
        .expect("Valid marker regex")
    });
    &PATTERN
}

/// A currency marker starting the text, optionally after whitespace.
fn marker_ahead() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(
            r"^\s*(?:{}|(?:{}|RMB|(?i:{}|sats?))(?:[^A-Za-z]|$))",
            marker_alternation(),
            fiat_alternation(),
            crypto_alternation()
        ))
        .expect("Valid marker regex")
    });
    &PATTERN
}

fn amount_behind() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*\s*$").expect("Valid amount regex"));
    &PATTERN
}

fn amount_ahead() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\s*\d+(?:[.,]\d+)*").expect("Valid amount regex"));
    &PATTERN
}

/// True when the text carries a currency glyph such as `$` or `kr`.
pub fn has_currency_symbol(text: &str) -> bool {
    SYMBOLS.iter().any(|symbol| text.contains(symbol))
}

/// True when the text carries a standalone currency code or ticker.
pub fn has_currency_code(text: &str) -> bool {
    code_token().is_match(text)
}

struct RawMatch<'t> {
    start: usize,
    end: usize,
    text: &'t str,
    pattern_id: &'static str,
    category: PatternCategory,
    rank: u16,
    index: usize,
}

impl RawMatch<'_> {
    /// Ordering key for overlap resolution; the greatest key wins.
    fn specificity(&self) -> (bool, bool, usize, Reverse<u16>, Reverse<usize>, Reverse<usize>) {
        (
            has_currency_symbol(self.text),
            has_currency_code(self.text),
            self.text.chars().count(),
            Reverse(self.rank),
            Reverse(self.start),
            Reverse(self.index),
        )
    }

    fn overlaps(&self, other: &RawMatch<'_>) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when this reading takes a marker that belongs to a neighbouring
    /// amount: the second `€` in `€10 €20`, or the first `kr` read as the
    /// prefix of `200` in `100 kr 200 kr`.
    fn steals_neighbour_marker(&self, source: &str) -> bool {
        let before = &source[..self.start];
        let after = &source[self.end..];
        let amount_first = self.text.starts_with(|c: char| c.is_ascii_digit());
        let amount_last = self.text.ends_with(char::is_numeric);

        if amount_first && !amount_last {
            let Some(next) = amount_ahead().find(after) else {
                return false;
            };
            let next_is_bare = !marker_ahead().is_match(&after[next.end()..]);
            next_is_bare && marker_behind().is_match(before)
        } else if amount_last && !amount_first {
            let Some(previous) = amount_behind().find(before) else {
                return false;
            };
            let previous_is_bare = !marker_behind().is_match(&before[..previous.start()]);
            previous_is_bare && marker_ahead().is_match(after)
        } else {
            false
        }
    }

    fn into_match(self) -> PriceMatch {
        PriceMatch {
            start: self.start,
            end: self.end,
            text: self.text.to_string(),
            pattern_id: self.pattern_id,
            category: self.category,
            rank: self.rank,
        }
    }
}

/// Scans text against a [`PatternDictionary`] and resolves overlaps.
#[derive(Debug)]
pub struct PriceMatcher {
    dictionary: Arc<PatternDictionary>,
    cache: Mutex<BoundedCache<String, Vec<PriceMatch>>>,
}

impl PriceMatcher {
    /// Creates a matcher over the built-in dictionary.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MATCH_CACHE_CAPACITY)
    }

    /// Creates a matcher whose memo holds at most `capacity` texts.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_dictionary(Arc::new(PatternDictionary::standard().clone()), capacity)
    }

    pub fn with_dictionary(dictionary: Arc<PatternDictionary>, capacity: usize) -> Self {
        Self {
            dictionary,
            cache: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    pub fn dictionary(&self) -> &PatternDictionary {
        &self.dictionary
    }

    /// Runs the full scan without consulting or filling the memo.
    pub fn find_matches_uncached(&self, text: &str) -> Vec<PriceMatch> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut raw = self.collect_raw(text);
        raw.retain(|m| !m.steals_neighbour_marker(text));
        raw.sort_by_cached_key(|m| Reverse(m.specificity()));

        let mut kept: Vec<RawMatch<'_>> = Vec::new();
        for candidate in raw {
            if kept.iter().all(|accepted| !accepted.overlaps(&candidate)) {
                kept.push(candidate);
            }
        }
        kept.sort_by_key(|m| m.start);

        kept.into_iter().map(RawMatch::into_match).collect()
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn collect_raw<'t>(&self, text: &'t str) -> Vec<RawMatch<'t>> {
        let mut raw = Vec::new();
        for (index, pattern) in self.dictionary.iter().enumerate() {
            for found in pattern.regex().find_iter(text) {
                let matched = found.as_str();
                let trimmed = matched.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let start = found.start() + (matched.len() - matched.trim_start().len());
                let end = start + trimmed.len();
                raw.push(RawMatch {
                    start,
                    end,
                    text: trimmed,
                    pattern_id: pattern.id,
                    category: pattern.category,
                    rank: pattern.rank,
                    index,
                });
            }
        }
        raw
    }
}

impl Default for PriceMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher for PriceMatcher {
    fn find_matches(&self, text: &str) -> Vec<PriceMatch> {
        if text.is_empty() {
            return Vec::new();
        }

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&text.to_string()) {
                return hit;
            }
        }

        let matches = self.find_matches_uncached(text);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), matches.clone());
        }
        matches
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.lock().ok().map(|cache| cache.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<String> {
        PriceMatcher::new()
            .find_matches(text)
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(PriceMatcher::new().find_matches("").is_empty());
        assert!(PriceMatcher::new().find_matches("no prices here").is_empty());
    }

    #[test]
    fn test_specific_dollar_wins_overlap() {
        assert_eq!(texts("CAD$50 or $10"), vec!["CAD$50", "$10"]);
    }

    #[test]
    fn test_symbol_and_code_beat_symbol_only() {
        assert_eq!(texts("Total: $1,200 HKD"), vec!["$1,200 HKD"]);
    }

    #[test]
    fn test_longer_match_wins_among_symbols() {
        assert_eq!(texts("only AU$19⁹⁹⁹ today"), vec!["AU$19⁹⁹⁹"]);
        assert_eq!(texts("JP¥ 10,000"), vec!["JP¥ 10,000"]);
    }

    #[test]
    fn test_adjacent_prices_sharing_a_reading_both_survive() {
        assert_eq!(texts("10 EUR 20 EUR"), vec!["10 EUR", "20 EUR"]);
        assert_eq!(texts("USD 5 USD 7"), vec!["USD 5", "USD 7"]);
    }

    #[test]
    fn test_marker_between_amounts_goes_to_bare_side() {
        assert_eq!(texts("€10 €20"), vec!["€10", "€20"]);
        assert_eq!(texts("Was €12 €9 now"), vec!["€12", "€9"]);
        assert_eq!(texts("100 kr 200 kr"), vec!["100 kr", "200 kr"]);
        assert_eq!(texts("12,50 € 15,00 €"), vec!["12,50 €", "15,00 €"]);
        assert_eq!(texts("500 ₽ 700 ₽"), vec!["500 ₽", "700 ₽"]);
    }

    #[test]
    fn test_spans_index_source() {
        let text = "Price: €1.234,56 and £20";
        for m in PriceMatcher::new().find_matches(text) {
            assert_eq!(&text[m.start..m.end], m.text);
        }
    }

    #[test]
    fn test_matches_are_sorted_and_disjoint() {
        let text = "USD 5, 10 EUR, ₹1,23,456, ₿0.5 and 100 sats";
        let matches = PriceMatcher::new().find_matches(text);
        assert!(matches.len() >= 4);
        for pair in matches.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_code_detection() {
        assert!(has_currency_code("CAD$50"));
        assert!(has_currency_code("SEKkr 100"));
        assert!(has_currency_code("100 USD"));
        assert!(!has_currency_code("$100"));
        assert!(!has_currency_code("AU$100"));
    }

    #[test]
    fn test_cache_hits_on_repeat() {
        let matcher = PriceMatcher::new();
        let first = matcher.find_matches("$5 and €6");
        let second = matcher.find_matches("$5 and €6");
        assert_eq!(first, second);

        let stats = matcher.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let matcher = PriceMatcher::with_capacity(2);
        for n in 0..5 {
            matcher.find_matches(&format!("${n}"));
        }
        assert_eq!(matcher.cache_stats().unwrap().entries, 2);
    }
}
