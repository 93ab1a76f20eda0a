//! Runtime configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration.

use crate::conversion::{BtcDisplay, FormatOptions};
use crate::domain::amount::PlausibilityPolicy;
use crate::domain::currency::CurrencyCode;
use crate::domain::matcher::DEFAULT_MATCH_CACHE_CAPACITY;
use crate::domain::resolver::DEFAULT_CONTEXT_WINDOW;
use crate::error::{PriceScanError, PriceScanResult};
use crate::rates::{AcquisitionSettings, RetryPolicy, COINGECKO_URL, FRANKFURTER_URL};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    pub refresh_interval_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub request_timeout_secs: u64,
    pub fiat_endpoint: String,
    pub crypto_endpoint: String,
    pub store_path: Option<PathBuf>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            request_timeout_secs: 10,
            fiat_endpoint: FRANKFURTER_URL.to_string(),
            crypto_endpoint: COINGECKO_URL.to_string(),
            store_path: None,
        }
    }
}

impl AcquisitionConfig {
    pub fn settings(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            retry: RetryPolicy::exponential(
                self.max_retries,
                Duration::from_millis(self.backoff_base_ms),
                Duration::from_millis(self.backoff_max_ms),
            ),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_currency: CurrencyCode,
    pub target_currencies: Vec<CurrencyCode>,
    pub btc_display: BtcDisplay,
    pub dynamic_sats_threshold: f64,
    pub plausibility: PlausibilityPolicy,
    pub match_cache_capacity: usize,
    pub context_window_chars: usize,
    pub acquisition: AcquisitionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_currency: CurrencyCode::Usd,
            target_currencies: vec![
                CurrencyCode::Usd,
                CurrencyCode::Eur,
                CurrencyCode::Gbp,
                CurrencyCode::Btc,
            ],
            btc_display: BtcDisplay::Native,
            dynamic_sats_threshold: 0.01,
            plausibility: PlausibilityPolicy::default(),
            match_cache_capacity: DEFAULT_MATCH_CACHE_CAPACITY,
            context_window_chars: DEFAULT_CONTEXT_WINDOW,
            acquisition: AcquisitionConfig::default(),
        }
    }
}

fn invalid(parameter: &str, reason: impl Into<String>) -> PriceScanError {
    PriceScanError::Config {
        parameter: parameter.to_string(),
        reason: reason.into(),
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> PriceScanResult<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| invalid("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> PriceScanResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| PriceScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> PriceScanResult<()> {
        if self.acquisition.refresh_interval_secs == 0 {
            return Err(invalid(
                "acquisition.refresh_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.acquisition.backoff_base_ms > self.acquisition.backoff_max_ms {
            return Err(invalid(
                "acquisition.backoff_base_ms",
                "must not exceed backoff_max_ms",
            ));
        }
        if !(self.dynamic_sats_threshold.is_finite() && self.dynamic_sats_threshold >= 0.0) {
            return Err(invalid("dynamic_sats_threshold", "must be a non-negative number"));
        }
        if !(self.plausibility.max_value.is_finite() && self.plausibility.max_value > 0.0) {
            return Err(invalid("plausibility.max_value", "must be a positive number"));
        }
        if let Some((first, last)) = self.plausibility.year_range {
            if first > last {
                return Err(invalid("plausibility.year_range", "start must not exceed end"));
            }
        }
        Ok(())
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            btc_display: self.btc_display,
            dynamic_sats_threshold: self.dynamic_sats_threshold,
        }
    }
}
