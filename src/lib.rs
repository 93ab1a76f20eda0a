//! Price detection and currency conversion.
//!
//! This library finds prices in free text, works out which currency each one
//! is in, and converts them between fiat currencies and crypto assets using
//! periodically refreshed exchange rates.
//!
//! # Features
//!
//! - **Price Detection**: Symbol-first, code-suffixed, superscript-cents and
//!   regional digit-grouping forms, with overlap resolution by specificity
//! - **Number Parsing**: US, European and Indian separator conventions
//! - **Currency Resolution**: A prioritized rule chain that always yields a code
//! - **Conversion**: Pivot-based conversion with fiat and crypto formatting,
//!   including satoshi display for Bitcoin
//! - **Rate Acquisition**: Scheduled refresh with bounded exponential backoff
//!
//! # Architecture
//!
//! - [`domain`]: Pattern dictionary, matcher, parser and resolver
//! - [`scanner`]: Detection pipeline and per-document sessions
//! - [`conversion`]: Rate tables, conversion and display formatting
//! - [`rates`]: Upstream sources, persistence and the refresh state machine
//! - [`config`]: JSON configuration
//! - [`error`]: Error types
//!
//! # Quick Start
//!
//! ```
//! use pricescan::{CurrencyCode, PriceScanner, ResolutionContext};
//!
//! let scanner = PriceScanner::default();
//! let prices = scanner.scan("CAD$50 or $10", &ResolutionContext::new());
//!
//! assert_eq!(prices.len(), 2);
//! assert_eq!(prices[0].currency, CurrencyCode::Cad);
//! assert_eq!(prices[1].currency, CurrencyCode::Usd);
//! ```
//!
//! # Examples
//!
//! ## Conversion
//!
//! ```
//! use pricescan::{ConversionEngine, CurrencyCode, RateTable};
//! use std::sync::Arc;
//!
//! let rates = RateTable::from_rates([(CurrencyCode::Eur, 0.9)]);
//! let engine = ConversionEngine::new(Arc::new(rates));
//!
//! let usd = engine.convert(10.0, CurrencyCode::Eur, CurrencyCode::Usd).unwrap();
//! assert!((usd - 11.111).abs() < 0.001);
//! assert_eq!(engine.format(1234.5, CurrencyCode::Eur), "€1,234.50");
//! ```
//!
//! ## Pattern Matching
//!
//! ```
//! use pricescan::domain::{PatternMatcher, PriceMatcher};
//!
//! let matcher = PriceMatcher::new();
//! let matches = matcher.find_matches("€1.234,56 and ₹1,23,456");
//! assert_eq!(matches.len(), 2);
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod domain;
pub mod error;
pub mod rates;
pub mod scanner;

pub use cache::CacheStats;
pub use config::Config;
pub use conversion::{
    BtcDisplay, Conversion, ConversionEngine, FormatOptions, RateSnapshot, RateTable,
};
pub use domain::{
    extract_amount, CurrencyCode, CurrencyResolver, NumberParser, PageDocument, PatternMatcher,
    PriceMatch, PriceMatcher, ResolutionContext, ResolvedBy,
};
pub use error::{PriceScanError, PriceScanResult};
pub use rates::{RateAcquisition, RateSource, RateStatus, RateStore};
pub use scanner::{DetectedPrice, PriceScanner, ScanSession};
