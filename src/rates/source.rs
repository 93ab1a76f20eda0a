//! Upstream rate providers.
//!
//! Both sources report rates against USD. Fiat rates arrive as units per
//! USD already; crypto prices arrive as USD per unit and are inverted.

use crate::domain::currency::CurrencyCode;
use crate::error::{PriceScanError, PriceScanResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const FRANKFURTER_URL: &str = "https://api.frankfurter.dev/v1/latest?base=USD";
pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// A provider of `(currency, units per USD)` pairs.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> PriceScanResult<Vec<(CurrencyCode, f64)>>;
}

fn build_client(timeout: Duration) -> PriceScanResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pricescan/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PriceScanError::Config {
            parameter: "request_timeout_secs".to_string(),
            reason: e.to_string(),
        })
}

async fn get_text(client: &Client, url: &str) -> PriceScanResult<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    base: String,
    rates: HashMap<String, f64>,
}

/// Parses a Frankfurter `latest` payload based on USD.
///
/// Codes outside the supported set are skipped.
pub fn parse_fiat_response(body: &str) -> PriceScanResult<Vec<(CurrencyCode, f64)>> {
    let payload: FrankfurterResponse =
        serde_json::from_str(body).map_err(|e| PriceScanError::Decode {
            source_name: "frankfurter".to_string(),
            reason: e.to_string(),
        })?;

    if !payload.base.eq_ignore_ascii_case(CurrencyCode::PIVOT.code()) {
        return Err(PriceScanError::Decode {
            source_name: "frankfurter".to_string(),
            reason: format!("expected base USD, got {}", payload.base),
        });
    }

    let rates: Vec<(CurrencyCode, f64)> = payload
        .rates
        .iter()
        .filter_map(|(code, rate)| {
            CurrencyCode::from_code(code)
                .filter(|c| c.is_fiat())
                .map(|c| (c, *rate))
        })
        .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
        .collect();

    if rates.is_empty() {
        return Err(PriceScanError::Decode {
            source_name: "frankfurter".to_string(),
            reason: "no supported rates in response".to_string(),
        });
    }
    Ok(rates)
}

/// Parses a CoinGecko `simple/price` payload quoted in USD.
///
/// Each price is inverted into units per USD; zero or missing prices are
/// skipped.
pub fn parse_crypto_response(body: &str) -> PriceScanResult<Vec<(CurrencyCode, f64)>> {
    let payload: HashMap<String, HashMap<String, f64>> =
        serde_json::from_str(body).map_err(|e| PriceScanError::Decode {
            source_name: "coingecko".to_string(),
            reason: e.to_string(),
        })?;

    let rates: Vec<(CurrencyCode, f64)> = payload
        .iter()
        .filter_map(|(asset, quotes)| {
            let code = CurrencyCode::from_coingecko_id(asset)?;
            let price = quotes.get("usd").copied()?;
            (price.is_finite() && price > 0.0).then(|| (code, 1.0 / price))
        })
        .collect();

    if rates.is_empty() {
        return Err(PriceScanError::Decode {
            source_name: "coingecko".to_string(),
            reason: "no supported prices in response".to_string(),
        });
    }
    Ok(rates)
}

/// Fiat rates from the Frankfurter API.
#[derive(Debug, Clone)]
pub struct FrankfurterSource {
    client: Client,
    url: String,
}

impl FrankfurterSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> PriceScanResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RateSource for FrankfurterSource {
    fn name(&self) -> &str {
        "frankfurter"
    }

    async fn fetch(&self) -> PriceScanResult<Vec<(CurrencyCode, f64)>> {
        debug!(url = %self.url, "Fetching fiat rates");
        let body = get_text(&self.client, &self.url).await?;
        parse_fiat_response(&body)
    }
}

/// Crypto prices from the CoinGecko API.
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: Client,
    url: String,
}

impl CoinGeckoSource {
    /// `endpoint` is the `simple/price` URL without a query string.
    pub fn new(endpoint: &str, timeout: Duration) -> PriceScanResult<Self> {
        let url = format!(
            "{}?ids={}&vs_currencies=usd",
            endpoint.trim_end_matches('?'),
            CurrencyCode::coingecko_id_list()
        );
        Ok(Self {
            client: build_client(timeout)?,
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch(&self) -> PriceScanResult<Vec<(CurrencyCode, f64)>> {
        debug!(url = %self.url, "Fetching crypto prices");
        let body = get_text(&self.client, &self.url).await?;
        parse_crypto_response(&body)
    }
}
