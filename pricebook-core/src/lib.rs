//! Pricebook Core: daily price cache, stale-snapshot fallback, sheet orchestration.
//!
//! This crate contains:
//! - Per-day JSON cache snapshots with atomic writes
//! - Read-cache resolution with fallback to the newest prior snapshot
//! - A paced, cache-first price fetcher over a pluggable provider (Yahoo Finance)
//! - The spreadsheet contract (ticker column in, price column out) and a CSV workbook
//! - The orchestrator tying one run together

pub mod cache;
pub mod config;
pub mod data;
pub mod fetcher;
pub mod mode;
pub mod orchestrator;
pub mod sheet;

pub use cache::{CacheError, CacheSource, CacheStore, DateKey, PriceCache, PriceRecord, Ticker};
pub use config::{ConfigError, PriceBookConfig};
pub use data::{PriceError, PriceProvider, Quote, YahooProvider};
pub use fetcher::{FetchFailure, FetchStats, PriceFetcher};
pub use mode::RunMode;
pub use orchestrator::{Orchestrator, ResultRow, RowOutcome, RunError, RunReport};
pub use sheet::{CsvWorkbook, Workbook};
