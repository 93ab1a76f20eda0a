//! Amount extraction from matched price text.
//!
//! Separators are ambiguous across locales: `1.234,56` and `1,234.56` are the
//! same value, and `1,23,456` uses Indian lakh grouping. The parser classifies
//! separator usage from the positions of the last dot and last comma.

use super::patterns::{crypto_alternation, fiat_alternation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separator convention a digit string was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// Digits only, or a single dot decimal.
    Plain,
    /// Comma thousands, dot decimal.
    Us,
    /// Dot thousands, comma decimal.
    European,
    /// Lakh grouping: two-digit groups ahead of a final three-digit group.
    Indian,
}

/// Why a parsed value is not accepted as a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NonFinite,
    NotPositive,
    TooLarge,
    LooksLikeYear,
}

/// Heuristic bounds separating prices from other numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityPolicy {
    pub max_value: f64,
    /// Inclusive range of integers treated as calendar years.
    pub year_range: Option<(u32, u32)>,
}

impl Default for PlausibilityPolicy {
    fn default() -> Self {
        Self {
            max_value: 1e9,
            year_range: Some((1900, 2100)),
        }
    }
}

impl PlausibilityPolicy {
    pub fn check(&self, value: f64) -> Option<Rejection> {
        if !value.is_finite() {
            return Some(Rejection::NonFinite);
        }
        if value <= 0.0 {
            return Some(Rejection::NotPositive);
        }
        if value > self.max_value {
            return Some(Rejection::TooLarge);
        }
        if let Some((first, last)) = self.year_range {
            if value.fract() == 0.0 && value >= f64::from(first) && value <= f64::from(last) {
                return Some(Rejection::LooksLikeYear);
            }
        }
        None
    }
}

/// A numeric value read from a price match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParsedAmount {
    pub value: f64,
    pub format: NumberFormat,
    pub rejection: Option<Rejection>,
}

impl ParsedAmount {
    pub fn is_plausible(&self) -> bool {
        self.rejection.is_none()
    }
}

fn trailing_code() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(
            r"(?i)\s*(?:{}|{}|RMB|sats?)\s*$",
            fiat_alternation(),
            crypto_alternation()
        ))
        .expect("Valid trailing code regex")
    });
    &PATTERN
}

fn indian_grouping() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\d{1,2}(?:,\d{2})+,\d{3}$").expect("Valid grouping regex"));
    &PATTERN
}

fn superscript_digit(c: char) -> Option<char> {
    let digit = match c {
        '⁰' => '0',
        '¹' => '1',
        '²' => '2',
        '³' => '3',
        '⁴' => '4',
        '⁵' => '5',
        '⁶' => '6',
        '⁷' => '7',
        '⁸' => '8',
        '⁹' => '9',
        _ => return None,
    };
    Some(digit)
}

/// Rewrites superscript cents as ordinary digits behind a decimal point.
///
/// `19⁹⁹⁹` becomes `19.999`; when the digits right before already hold a
/// dot the superscripts are appended as-is. Dots in decoration such as
/// `Rs.` do not count.
fn normalize_superscript(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    let mut in_run = false;
    let mut seen_digit = false;
    let mut number_has_dot = false;
    for c in text.chars() {
        match superscript_digit(c) {
            Some(digit) => {
                if !in_run && !number_has_dot {
                    out.push('.');
                }
                in_run = true;
                out.push(digit);
            }
            None => {
                in_run = false;
                if c.is_ascii_digit() {
                    seen_digit = true;
                } else if c == '.' {
                    number_has_dot |= seen_digit;
                } else if c != ',' {
                    seen_digit = false;
                    number_has_dot = false;
                }
                out.push(c);
            }
        }
    }
    out
}

/// Converts locale-formatted digit strings into numbers.
#[derive(Debug, Clone, Default)]
pub struct NumberParser {
    policy: PlausibilityPolicy,
}

impl NumberParser {
    pub fn new(policy: PlausibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PlausibilityPolicy {
        &self.policy
    }

    /// Reads the amount out of a matched price.
    ///
    /// Returns `None` when no digit survives cleanup or the result does not
    /// parse. Implausible values come back with `rejection` set.
    pub fn extract_amount(&self, matched: &str) -> Option<ParsedAmount> {
        let without_code = trailing_code().replace(matched, "");
        let normalized = normalize_superscript(&without_code);

        let cleaned: String = normalized
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
            .collect();
        let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');
        if !cleaned.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }

        let (digits, format) = classify(cleaned);
        let value: f64 = digits.parse().ok()?;

        Some(ParsedAmount {
            value,
            format,
            rejection: self.policy.check(value),
        })
    }
}

/// Picks the separator convention and returns a `str::parse`-ready string.
fn classify(cleaned: &str) -> (String, NumberFormat) {
    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    if let Some(comma) = last_comma.filter(|c| last_dot.map_or(true, |d| *c > d)) {
        let fraction = &cleaned[comma + 1..];
        if fraction.len() < 3 {
            let integer = strip_separators(&cleaned[..comma]);
            return (format!("{integer}.{fraction}"), NumberFormat::European);
        }
        if last_dot.is_none() && indian_grouping().is_match(cleaned) {
            return (cleaned.replace(',', ""), NumberFormat::Indian);
        }
        return (strip_separators(cleaned), NumberFormat::Us);
    }

    if last_dot.is_none() {
        return (cleaned.to_string(), NumberFormat::Plain);
    }
    if cleaned.matches('.').count() > 1 {
        // Repeated dots can only be grouping.
        return (strip_separators(cleaned), NumberFormat::European);
    }
    if last_comma.is_none() {
        return (cleaned.to_string(), NumberFormat::Plain);
    }

    let integer = cleaned.split('.').next().unwrap_or_default();
    let format = if indian_grouping().is_match(integer) {
        NumberFormat::Indian
    } else {
        NumberFormat::Us
    };
    (cleaned.replace(',', ""), format)
}

fn strip_separators(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Parses with the default plausibility policy.
pub fn extract_amount(matched: &str) -> Option<ParsedAmount> {
    NumberParser::default().extract_amount(matched)
}
