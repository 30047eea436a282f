use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use super::QuoteSource;
use crate::types::{metal_code, MetalsQuote};

pub const METALS_API_URL: &str = "https://api.metalpriceapi.com/v1";

/// Decimal places kept for converted prices
const PRICE_DECIMALS: u32 = 2;

#[derive(Debug, Clone)]
pub struct MetalsApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    base_currency: String,
    instruments: Vec<String>,
}

impl MetalsApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        base_currency: impl Into<String>,
        instruments: Vec<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            base_currency: base_currency.into(),
            instruments,
        }
    }

    /// Comma-separated metal codes requested from the API
    fn currencies(&self) -> String {
        self.instruments
            .iter()
            .filter_map(|i| metal_code(i))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub async fn get_latest(&self) -> Result<MetalsQuote> {
        let url = format!("{}/latest", self.base_url);
        let currencies = self.currencies();
        debug!("Requesting latest rates for {} in {}", currencies, self.base_currency);

        let resp: LatestRatesResponse = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("base", self.base_currency.as_str()),
                ("currencies", currencies.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let quote = quote_from_response(resp, &self.instruments)?;
        info!("Fetched quote at {}: {:?}", quote.timestamp, quote.prices);
        Ok(quote)
    }
}

#[async_trait]
impl QuoteSource for MetalsApiClient {
    async fn latest_quote(&self) -> Result<MetalsQuote> {
        self.get_latest().await
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    success: bool,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Rates are units of metal per base-currency unit; invert them into prices
fn quote_from_response(resp: LatestRatesResponse, instruments: &[String]) -> Result<MetalsQuote> {
    if !resp.success {
        return Err(anyhow!(
            "Metals API request failed: {}",
            resp.error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string())
        ));
    }

    let ts = resp
        .timestamp
        .ok_or_else(|| anyhow!("Metals API response has no timestamp"))?;
    let timestamp = Utc
        .timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| anyhow!("Invalid timestamp in Metals API response: {}", ts))?;

    let mut quote = MetalsQuote::new(timestamp);
    for instrument in instruments {
        let code = metal_code(instrument)
            .ok_or_else(|| anyhow!("Invalid instrument name: {}", instrument))?;
        let rate = *resp
            .rates
            .get(&code)
            .ok_or_else(|| anyhow!("Metals API response has no rate for {}", code))?;
        let rate = Decimal::try_from(rate)?;
        let price = Decimal::ONE
            .checked_div(rate)
            .ok_or_else(|| anyhow!("Unusable rate for {}: {}", code, rate))?
            .round_dp(PRICE_DECIMALS);
        quote = quote.with_price(instrument.clone(), price);
    }

    Ok(quote)
}
