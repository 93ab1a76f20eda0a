//! Reassembly of prices spread over adjacent structural groups.
//!
//! Storefronts often render `$`, `349` and `99` in sibling elements. The
//! document layer hands the symbol group and the groups that follow it; this
//! module stitches them back into a single price string for the scanner.

use super::currency::DOLLAR_PREFIXES;
use once_cell::sync::Lazy;
use regex::Regex;

/// Symbols other than letter-prefixed dollars that may stand alone in their own group.
const STANDALONE_SYMBOLS: &[&str] = &[
    "JP¥", "CN¥", "$", "€", "£", "¥", "￥", "₹", "₩", "₺", "₽", "₪", "₫", "₱", "฿", "₿", "元", "kr",
    "zł",
];

fn digits_and_commas() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d,]+$").expect("Valid regex"));
    &PATTERN
}

fn complete_price() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[\d,]+\.\d+$").expect("Valid regex"));
    &PATTERN
}

/// True when a group holds nothing but a currency symbol.
pub fn is_symbol_only(text: &str) -> bool {
    let trimmed = text.trim();
    let prefixed_dollar = trimmed
        .strip_suffix('$')
        .map_or(false, |prefix| DOLLAR_PREFIXES.iter().any(|(p, _)| *p == prefix));
    prefixed_dollar || STANDALONE_SYMBOLS.iter().any(|symbol| *symbol == trimmed)
}

/// Joins a symbol group with the numeric groups that follow it.
///
/// Integer digits, a lone `.` group and a two-digit fraction group are
/// accepted. A group that already holds a complete decimal price replaces
/// anything gathered so far. Returns `None` when the symbol group is not a
/// bare symbol or no digits were collected.
pub fn assemble_split_price(symbol: &str, groups: &[&str]) -> Option<String> {
    let symbol = symbol.trim();
    if !is_symbol_only(symbol) {
        return None;
    }

    let mut price = String::new();
    let mut has_decimal = false;

    for (position, group) in groups.iter().enumerate() {
        let text = group.trim();

        if text.is_empty() && position == 0 {
            continue;
        }

        if digits_and_commas().is_match(text) {
            let whole_digits = !price.is_empty() && price.chars().all(|c| c.is_ascii_digit());
            if has_decimal {
                price.push_str(text);
                break;
            }
            if whole_digits && text.len() == 2 {
                price.push('.');
                price.push_str(text);
                break;
            }
            price.push_str(text);
        } else if text == "." {
            price.push('.');
            has_decimal = true;
        } else if complete_price().is_match(text) {
            price = text.to_string();
            break;
        } else if let Some(integer) = text.strip_suffix('.') {
            // Whole part rendered together with its decimal point.
            if !digits_and_commas().is_match(integer) {
                break;
            }
            price.push_str(text);
            has_decimal = true;
        } else {
            break;
        }
    }

    if price.chars().any(|c| c.is_ascii_digit()) {
        Some(format!("{symbol}{price}"))
    } else {
        None
    }
}
