//! HTTP quote source
//!
//! Fetches single-symbol quotes from a JSON endpoint of the form
//! `GET {base_url}/quote?symbol=AAPL` and normalizes them into [`Snapshot`]s.

use super::{FetchError, MarketDataSource, Snapshot};
use crate::config::SourceConfig;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Header carrying the provider API key
const API_KEY_HEADER: &str = "X-API-Key";

/// Raw quote payload from the provider
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    symbol: String,
    price: Decimal,
    previous_close: Decimal,
    #[serde(default)]
    volume: u64,
    #[serde(default)]
    name: Option<String>,
    /// Quote time in epoch milliseconds
    timestamp: i64,
}

/// reqwest-backed [`MarketDataSource`]
pub struct HttpQuoteSource {
    config: SourceConfig,
    client: Client,
}

impl HttpQuoteSource {
    /// Create a source for the configured provider
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, client })
    }

    fn quote_url(&self) -> String {
        format!("{}/quote", self.config.base_url.trim_end_matches('/'))
    }

    /// Parse a provider payload into a Snapshot
    fn parse_quote(body: &str) -> Result<Snapshot, FetchError> {
        let raw: QuoteResponse =
            serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let as_of = Utc
            .timestamp_millis_opt(raw.timestamp)
            .single()
            .ok_or_else(|| FetchError::Parse(format!("invalid timestamp {}", raw.timestamp)))?;

        let name = raw.name.unwrap_or_else(|| raw.symbol.clone());
        Ok(Snapshot {
            symbol: raw.symbol,
            price: raw.price,
            previous_close: raw.previous_close,
            volume: raw.volume,
            name,
            as_of,
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.timeout())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl MarketDataSource for HttpQuoteSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        let url = self.quote_url();
        tracing::debug!(url = %url, symbol, "Fetching quote");

        let mut request = self.client.get(&url).query(&[("symbol", symbol)]);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        Self::parse_quote(&body)
    }
}
