//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over the remote quote source so the
//! fetcher can be driven by Yahoo Finance in production and by a scripted
//! provider in tests.

use crate::cache::Ticker;
use serde_json::{Map, Value};
use thiserror::Error;

/// Latest daily close plus the provider's metadata blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub close: f64,
    pub info: Map<String, Value>,
}

/// Structured error types for remote lookups.
///
/// Every variant is a per-ticker soft failure as far as a run is concerned.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no price data for {symbol}")]
    NoPriceData { symbol: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Trait for remote quote sources.
///
/// Providers know nothing about the cache or pacing; the fetcher sits above.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Most recent daily close for `ticker` with its metadata.
    fn fetch_latest(&self, ticker: &Ticker) -> Result<Quote, PriceError>;
}
