//! Error types for the price scanning library.
//!
//! Detection, parsing and currency resolution never fail on bad input; they
//! yield fewer results instead. The variants below cover the parts of the
//! crate that touch the outside world: rate upstreams, persistence and
//! configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fallible pricescan operations.
pub type PriceScanResult<T> = Result<T, PriceScanError>;

/// Error type for all fallible operations in the crate.
#[derive(Debug, Error)]
pub enum PriceScanError {
    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// Transport-level failure talking to a rate upstream
    #[error("{source_name} request failed: {message}")]
    Http {
        source_name: String,
        message: String,
        timeout: bool,
    },

    /// Upstream answered with a non-success status code
    #[error("{source_name} returned HTTP {status}")]
    UpstreamStatus { source_name: String, status: u16 },

    /// Upstream payload could not be decoded into rates
    #[error("Failed to decode {source_name} response: {reason}")]
    Decode { source_name: String, reason: String },

    /// Persisted rate snapshot could not be read or written
    #[error("Rate store error for '{}': {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    /// Pattern compilation error
    #[error("Pattern error for '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },

    /// Currency code outside the supported set
    #[error("Unknown currency code '{0}'")]
    UnknownCurrency(String),

    /// Invalid configuration value
    #[error("Invalid configuration for '{parameter}': {reason}")]
    Config { parameter: String, reason: String },
}

impl PriceScanError {
    /// Returns true when retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::UpstreamStatus { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PriceScanError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::UpstreamStatus {
                source_name: host_of(&err),
                status: status.as_u16(),
            };
        }
        Self::Http {
            source_name: host_of(&err),
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

fn host_of(err: &reqwest::Error) -> String {
    err.url()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "upstream".to_string())
}
