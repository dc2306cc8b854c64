//! End-to-end run: sheet tickers → resolved prices → sheet, plus cache persistence.
//!
//! 1. Ensure the cache directory exists
//! 2. Resolve today's read-cache (today's snapshot or the newest stale one)
//! 3. Read tickers from the sheet
//! 4. Resolve each ticker; failures become the sentinel value
//! 5. Write the rows back in read order
//! 6. Online only: save today's records as today's snapshot

use crate::cache::{CacheError, CacheResolver, CacheSource, CacheStore, DateKey, Ticker};
use crate::config::{ConfigError, PriceBookConfig};
use crate::data::PriceProvider;
use crate::fetcher::{FetchStats, PriceFetcher};
use crate::mode::RunMode;
use crate::sheet::{self, CellValue, SheetError, Workbook};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Fatal run errors. Per-ticker failures never surface here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

/// What a row ended up with.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Price(f64),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub ticker: Ticker,
    pub outcome: RowOutcome,
}

impl ResultRow {
    pub fn price(&self) -> Option<f64> {
        match self.outcome {
            RowOutcome::Price(p) => Some(p),
            RowOutcome::Failed { .. } => None,
        }
    }

    /// Sheet value for this row: the price, or `sentinel` on failure.
    pub fn to_cell(&self, sentinel: &str) -> CellValue {
        match self.outcome {
            RowOutcome::Price(p) => CellValue::Number(p),
            RowOutcome::Failed { .. } => CellValue::Text(sentinel.to_string()),
        }
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RowOutcome::Price(p) => write!(f, "{}: {p}", self.ticker),
            RowOutcome::Failed { reason } => write!(f, "{}: failed ({reason})", self.ticker),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub today: DateKey,
    pub mode: RunMode,
    pub source: CacheSource,
    pub rows: Vec<ResultRow>,
    pub stats: FetchStats,
    /// Snapshot written this run; `None` in Offline mode.
    pub persisted_to: Option<PathBuf>,
}

impl RunReport {
    pub fn failed_count(&self) -> usize {
        self.rows.iter().filter(|r| r.price().is_none()).count()
    }
}

pub struct Orchestrator<'a> {
    config: &'a PriceBookConfig,
    store: CacheStore,
    provider: &'a dyn PriceProvider,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a PriceBookConfig, provider: &'a dyn PriceProvider) -> Self {
        Self {
            config,
            store: CacheStore::new(&config.cache.dir),
            provider,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Run against the local calendar date.
    pub fn run_today(&self, book: &mut dyn Workbook, mode: RunMode) -> Result<RunReport, RunError> {
        self.run(book, mode, DateKey::today())
    }

    /// Run as of `today`. The workbook is written but not saved.
    pub fn run(
        &self,
        book: &mut dyn Workbook,
        mode: RunMode,
        today: DateKey,
    ) -> Result<RunReport, RunError> {
        let layout = self.config.layout()?;

        self.store.ensure_directory()?;
        let resolved = CacheResolver::new(&self.store).resolve(today)?;
        let source = resolved.source;
        let mut cache = resolved.cache;

        let tickers = sheet::read_tickers(book, &layout, &self.config.fetch.market_suffix);
        info!(
            %today,
            %mode,
            %source,
            tickers = tickers.len(),
            "resolving prices"
        );

        let mut fetcher = PriceFetcher::new(self.provider, self.config.pacing_delay());
        let rows: Vec<ResultRow> = tickers
            .into_iter()
            .map(|ticker| {
                let outcome = match fetcher.resolve(&ticker, &mut cache, today, mode) {
                    Ok(record) => RowOutcome::Price(record.price),
                    Err(e) => RowOutcome::Failed {
                        reason: e.to_string(),
                    },
                };
                let row = ResultRow { ticker, outcome };
                info!("{row}");
                row
            })
            .collect();

        let sentinel = &self.config.fetch.failure_sentinel;
        let cells: Vec<CellValue> = rows.iter().map(|r| r.to_cell(sentinel)).collect();
        sheet::write_prices(book, &layout, &cells)?;

        let persisted_to = if mode.is_online() {
            // A stale read-cache stays under its own date; today's file gets only today's records.
            let snapshot = match source {
                CacheSource::Today(_) => cache,
                CacheSource::Fallback(_) | CacheSource::Empty => cache.on_date(today),
            };
            let path = self.store.save(&snapshot, today)?;
            info!(path = %path.display(), tickers = snapshot.ticker_count(), "cache saved");
            Some(path)
        } else {
            info!("offline mode, cache not saved");
            None
        };

        Ok(RunReport {
            today,
            mode,
            source,
            rows,
            stats: fetcher.stats(),
            persisted_to,
        })
    }
}
