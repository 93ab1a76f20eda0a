//! Whole-document currency inference.
//!
//! A page often declares its currency once, in metadata or structured data,
//! and then prints bare `$` prices everywhere. The detected code feeds
//! [`ResolutionContext::page_currency`](super::resolver::ResolutionContext).

use super::currency::CurrencyCode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Number of leading visible characters inspected for currency phrasing.
pub const VISIBLE_TEXT_BUDGET: usize = 1000;

/// Metadata keys that conventionally carry a currency code, by priority.
const META_KEYS: &[&str] = &[
    "og:price:currency",
    "product:price:currency",
    "priceCurrency",
    "currency",
    "twitter:data1",
];

/// A `<meta>`-style key/content pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetaTag {
    pub key: String,
    pub content: String,
}

impl MetaTag {
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
        }
    }
}

/// The parts of a document the detector looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageDocument {
    pub meta: Vec<MetaTag>,
    /// Raw JSON-LD blocks.
    pub structured_data: Vec<String>,
    /// Values of `itemprop="priceCurrency"` elements.
    pub microdata: Vec<String>,
    pub visible_text: String,
}

impl PageDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            visible_text: text.into(),
            ..Self::default()
        }
    }
}

static TEXT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)prices?\s+(?:are\s+)?(?:shown\s+)?in\s+([A-Z]{3})\b"#,
        r#"(?i)currency['":\s]+([A-Z]{3})\b"#,
        r#"(?i)priceCurrency['":\s]+([A-Z]{3})\b"#,
        r#"(?i)data-currency="([A-Z]{3})""#,
        r#"(?i)class="[^"]*currency-([A-Z]{3})[^"]*""#,
    ]
    .iter()
    .map(|source| Regex::new(source).expect("Valid page currency regex"))
    .collect()
});

fn supported(code: &str) -> Option<CurrencyCode> {
    let code = code.trim();
    if code.len() < 3 {
        return None;
    }
    CurrencyCode::from_code(code).filter(|c| *c != CurrencyCode::BtcSats)
}

/// Infers a single currency for a whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageCurrencyDetector;

impl PageCurrencyDetector {
    pub fn new() -> Self {
        Self
    }

    /// Checks metadata, then structured data, then microdata, then the
    /// first [`VISIBLE_TEXT_BUDGET`] characters of visible text.
    pub fn detect(&self, page: &PageDocument) -> Option<CurrencyCode> {
        let detected = Self::from_meta(&page.meta)
            .or_else(|| Self::from_structured_data(&page.structured_data))
            .or_else(|| page.microdata.iter().find_map(|value| supported(value)))
            .or_else(|| Self::from_visible_text(&page.visible_text));

        if let Some(currency) = detected {
            debug!(%currency, "Detected page currency");
        }
        detected
    }

    fn from_meta(meta: &[MetaTag]) -> Option<CurrencyCode> {
        META_KEYS.iter().find_map(|key| {
            meta.iter()
                .filter(|tag| tag.key == *key)
                .find_map(|tag| supported(&tag.content))
        })
    }

    fn from_structured_data(blocks: &[String]) -> Option<CurrencyCode> {
        blocks.iter().find_map(|block| match serde_json::from_str::<Value>(block) {
            Ok(value) => currency_in_json(&value),
            Err(err) => {
                debug!(error = %err, "Skipping malformed structured data block");
                None
            }
        })
    }

    fn from_visible_text(text: &str) -> Option<CurrencyCode> {
        let head: String = text.chars().take(VISIBLE_TEXT_BUDGET).collect();
        TEXT_PATTERNS.iter().find_map(|pattern| {
            pattern
                .captures_iter(&head)
                .find_map(|caps| caps.get(1).and_then(|m| supported(m.as_str())))
        })
    }
}

/// Looks for `priceCurrency` directly, then under `offers`, then anywhere
/// deeper in the tree.
fn currency_in_json(value: &Value) -> Option<CurrencyCode> {
    match value {
        Value::Array(items) => items.iter().find_map(currency_in_json),
        Value::Object(map) => {
            if let Some(code) = map.get("priceCurrency").and_then(Value::as_str) {
                if let Some(currency) = supported(code) {
                    return Some(currency);
                }
            }

            let offers: Vec<&Value> = match map.get("offers") {
                Some(Value::Array(offers)) => offers.iter().collect(),
                Some(offer) => vec![offer],
                None => Vec::new(),
            };
            let from_offers = offers.into_iter().find_map(|offer| {
                offer
                    .get("priceCurrency")
                    .and_then(Value::as_str)
                    .and_then(supported)
            });
            if from_offers.is_some() {
                return from_offers;
            }

            map.values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(currency_in_json)
        }
        _ => None,
    }
}
