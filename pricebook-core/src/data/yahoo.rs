//! Yahoo Finance price provider.
//!
//! Queries the v8 chart API for the most recent daily bar. The last non-null
//! close is the price; the chart `meta` object is kept verbatim as the
//! metadata blob.
//!
//! One request per lookup. Pacing between lookups is the fetcher's job.

use super::provider::{PriceError, PriceProvider, Quote};
use crate::cache::Ticker;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

pub const YAHOO_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Map<String, Value>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Result<Self, PriceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| PriceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: YAHOO_BASE_URL.to_string(),
        })
    }

    /// Point the provider at a different host (mirrors, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the chart API URL for the latest daily bar of `symbol`.
    fn chart_url(&self, symbol: &str) -> Result<Url, PriceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PriceError::Client(format!("invalid base url '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| PriceError::Client(format!("base url '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", "1d")
            .append_pair("interval", "1d");
        Ok(url)
    }

    /// Parse the chart API response into a quote.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Quote, PriceError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    PriceError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    PriceError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                PriceError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| PriceError::ResponseFormatChanged("result array is empty".into()))?;

        // An empty series means no trading data; that is not a format change.
        let close = data
            .indicators
            .quote
            .first()
            .and_then(|q| q.close.iter().rev().find_map(|c| *c))
            .filter(|c| c.is_finite())
            .ok_or_else(|| PriceError::NoPriceData {
                symbol: symbol.to_string(),
            })?;

        Ok(Quote {
            close,
            info: data.meta,
        })
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_latest(&self, ticker: &Ticker) -> Result<Quote, PriceError> {
        let symbol = ticker.as_str();
        let url = self.chart_url(symbol)?;

        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                PriceError::Timeout(e.to_string())
            } else {
                PriceError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Err(PriceError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(PriceError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(PriceError::Http {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            PriceError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, chart)
    }
}
