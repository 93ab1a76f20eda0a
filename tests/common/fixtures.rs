//! Test fixtures, fake rate sources and listing builders.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pricescan::error::{PriceScanError, PriceScanResult};
use pricescan::{CurrencyCode, RateSnapshot, RateSource, RateTable};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Fiat rates in units per USD.
pub fn fiat_rates() -> Vec<(CurrencyCode, f64)> {
    vec![
        (CurrencyCode::Eur, 0.9),
        (CurrencyCode::Gbp, 0.8),
        (CurrencyCode::Jpy, 150.0),
        (CurrencyCode::Cad, 1.35),
        (CurrencyCode::Aud, 1.5),
        (CurrencyCode::Inr, 83.0),
    ]
}

/// Crypto rates in units per USD (BTC at 100,000 USD, ETH at 2,500 USD).
pub fn crypto_rates() -> Vec<(CurrencyCode, f64)> {
    vec![(CurrencyCode::Btc, 0.00001), (CurrencyCode::Eth, 0.0004)]
}

pub fn sample_rates() -> RateTable {
    RateTable::merge(fiat_rates(), crypto_rates())
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn sample_snapshot() -> RateSnapshot {
    RateSnapshot::new(sample_rates(), fixed_time())
}

/// Writes a persisted snapshot the CLI can read.
pub fn write_rates_file(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("rates.json");
    fs::write(&path, serde_json::to_string_pretty(&sample_snapshot())?)?;
    Ok(path)
}

/// A scripted [`RateSource`] that never touches the network.
///
/// Scripted outcomes are consumed in order; once exhausted every call
/// returns the fallback outcome.
pub struct FakeRateSource {
    name: &'static str,
    script: Mutex<VecDeque<Result<Vec<(CurrencyCode, f64)>, String>>>,
    fallback: Result<Vec<(CurrencyCode, f64)>, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeRateSource {
    pub fn ok(name: &'static str, rates: Vec<(CurrencyCode, f64)>) -> Self {
        Self {
            name,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(rates),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            fallback: Err("connection refused".to_string()),
            ..Self::ok(name, Vec::new())
        }
    }

    /// Fails `failures` times before falling back to the configured outcome.
    pub fn failing_first(mut self, failures: usize) -> Self {
        self.script = Mutex::new(
            (0..failures)
                .map(|n| Err(format!("transient failure {}", n + 1)))
                .collect(),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for FakeRateSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> PriceScanResult<Vec<(CurrencyCode, f64)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted
            .unwrap_or_else(|| self.fallback.clone())
            .map_err(|message| PriceScanError::Http {
                source_name: self.name.to_string(),
                message,
                timeout: false,
            })
    }
}

/// Builder for product-listing text with prices embedded in prose.
///
/// # Example
///
/// ```ignore
/// let text = TestListingBuilder::new()
///     .with_title("Headphones")
///     .with_price("$99.99")
///     .with_content("Free shipping")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TestListingBuilder {
    title: Option<String>,
    lines: Vec<String>,
}

impl TestListingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_price(mut self, price: &str) -> Self {
        self.lines.push(format!("Now only {price}!"));
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.lines.push(content.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut text = String::new();
        if let Some(title) = &self.title {
            text.push_str(title);
            text.push('\n');
        }
        text.push_str(&self.lines.join("\n"));
        text
    }
}
