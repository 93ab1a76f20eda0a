//! Custom assertions for price detection testing.
//!
//! Provides domain-specific assertions that make tests more readable
//! and provide better error messages.

use pricescan::{CurrencyCode, DetectedPrice, PriceMatch};

/// Asserts two floats agree within `tolerance`.
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "Expected {expected} (±{tolerance}) but got {actual}"
    );
}

/// Asserts a price with the given text was detected with this amount and currency.
///
/// # Panics
/// Panics if no detected price has exactly `text`.
pub fn assert_detected(prices: &[DetectedPrice], text: &str, amount: f64, currency: CurrencyCode) {
    let price = prices.iter().find(|p| p.text == text).unwrap_or_else(|| {
        panic!(
            "Expected a price '{}' but found: {:?}",
            text,
            prices.iter().map(|p| p.text.as_str()).collect::<Vec<_>>()
        )
    });
    assert_close(price.amount, amount, 1e-9);
    assert_eq!(
        price.currency, currency,
        "Price '{}' resolved to {} instead of {}",
        text, price.currency, currency
    );
}

/// Asserts that no two matches share a character and that they are sorted.
pub fn assert_no_overlaps(matches: &[PriceMatch]) {
    for pair in matches.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "Matches '{}' [{}..{}] and '{}' [{}..{}] overlap or are out of order",
            pair[0].text,
            pair[0].start,
            pair[0].end,
            pair[1].text,
            pair[1].start,
            pair[1].end
        );
    }
}

/// Asserts each match's span slices the source to exactly its text.
pub fn assert_spans_valid(source: &str, matches: &[PriceMatch]) {
    for m in matches {
        assert!(m.start < m.end, "Empty span for '{}'", m.text);
        assert_eq!(
            source.get(m.start..m.end),
            Some(m.text.as_str()),
            "Span [{}..{}] does not index '{}'",
            m.start,
            m.end,
            m.text
        );
    }
}
