//! Property-based tests for detection.
//!
//! Feeds the matcher, parser and scanner a broad mix of hostile and
//! realistic inputs and checks the properties that must hold for all of
//! them: no panics, ordered disjoint spans, and deterministic output.

use pricescan::domain::{extract_amount, PatternMatcher, PriceMatcher};
use pricescan::{PriceScanner, ResolutionContext};

mod common;
use common::*;

const FRAGMENTS: &[&str] = &[
    "$", "€", "£", "¥", "₹", "₿", "CAD", "USD", "EUR", "BTC", "sats", "HK$", "CA$", "zł", "Kč",
    "1", "12", "99", "1,234", "1.234", "56", "0.5", ",", ".", " ", "\u{a0}", "⁹⁹", "-", "(", ")",
    "price", "only", "🙂", "\n",
];

/// Deterministic pseudo-random texts assembled from price-like fragments.
fn generated_inputs(count: usize) -> Vec<String> {
    let mut state: u64 = 0x5eed_1234_abcd_0001;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    (0..count)
        .map(|_| {
            let len = (next() % 12) as usize;
            (0..len)
                .map(|_| FRAGMENTS[(next() % FRAGMENTS.len() as u64) as usize])
                .collect()
        })
        .collect()
}

fn hostile_inputs() -> Vec<String> {
    vec![
        String::new(),
        "$".repeat(500),
        "9".repeat(2000),
        "1,".repeat(300),
        ".".repeat(300),
        "€ ".repeat(200),
        "⁹".repeat(100),
        "USD".repeat(100),
        "\u{0}\u{1}\u{2}".to_string(),
        "🔢💶💷".repeat(50),
        "$1$2$3$4$5".to_string(),
        "CAD$CAD$CAD$50".to_string(),
        "₹1,2,3,4,5,6".to_string(),
        "1.2.3.4.5 EUR".to_string(),
    ]
}

fn all_inputs() -> Vec<String> {
    let mut inputs = hostile_inputs();
    inputs.extend(generated_inputs(400));
    inputs
}

mod matcher_properties {
    use super::*;

    #[test]
    fn test_spans_are_valid_and_disjoint() {
        let matcher = PriceMatcher::new();
        for input in all_inputs() {
            let matches = matcher.find_matches(&input);
            assert_spans_valid(&input, &matches);
            assert_no_overlaps(&matches);
        }
    }

    #[test]
    fn test_matching_is_idempotent() {
        let matcher = PriceMatcher::new();
        for input in all_inputs() {
            let first = matcher.find_matches(&input);
            let second = matcher.find_matches(&input);
            assert_eq!(first, second, "Non-deterministic matches for {:?}", input);
        }
    }

    #[test]
    fn test_cached_equals_uncached() {
        let cached = PriceMatcher::new();
        for input in all_inputs() {
            assert_eq!(
                cached.find_matches(&input),
                cached.find_matches_uncached(&input),
                "Cache disagreed for {:?}",
                input
            );
        }
    }
}

mod parser_properties {
    use super::*;

    #[test]
    fn test_extract_amount_never_panics() {
        for input in all_inputs() {
            if let Some(parsed) = extract_amount(&input) {
                assert!(parsed.value.is_finite() || parsed.rejection.is_some());
                assert!(parsed.value >= 0.0);
            }
        }
    }

    #[test]
    fn test_plain_integers_parse_exactly() {
        for n in [1u64, 7, 42, 999, 1000, 65_535, 1_000_000] {
            let parsed = extract_amount(&format!("${n}")).unwrap();
            assert_close(parsed.value, n as f64, 0.0);
        }
    }
}

mod scanner_properties {
    use super::*;

    #[test]
    fn test_detected_prices_are_plausible() {
        let scanner = PriceScanner::default();
        let context = ResolutionContext::new();
        for input in all_inputs() {
            for price in scanner.scan(&input, &context) {
                assert!(price.amount.is_finite());
                assert!(price.amount > 0.0);
                assert_eq!(&input[price.start..price.end], price.text);
            }
        }
    }
}
