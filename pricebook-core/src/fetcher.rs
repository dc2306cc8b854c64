//! Per-ticker price resolution: today's cache first, then one paced network lookup.

use crate::cache::{DateKey, PriceCache, PriceRecord, Ticker};
use crate::data::{PriceError, PriceProvider};
use crate::mode::RunMode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a ticker has no price this run. Never fatal to the run.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("no cached value and offline mode")]
    Offline,

    #[error("fetch error: {0}")]
    Fetch(#[from] PriceError),
}

/// Counters for one run's worth of resolutions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub cache_hits: usize,
    pub network_calls: usize,
    pub failures: usize,
}

pub struct PriceFetcher<'a> {
    provider: &'a dyn PriceProvider,
    pacing_delay: Duration,
    stats: FetchStats,
}

impl<'a> PriceFetcher<'a> {
    pub fn new(provider: &'a dyn PriceProvider, pacing_delay: Duration) -> Self {
        Self {
            provider,
            pacing_delay,
            stats: FetchStats::default(),
        }
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Resolve `ticker`'s record for `today`.
    ///
    /// A cache hit returns immediately. A miss in Online mode sleeps the
    /// pacing delay, asks the provider once, and on success stores the record
    /// at `cache[ticker][today]`. Failures leave the cache untouched.
    pub fn resolve(
        &mut self,
        ticker: &Ticker,
        cache: &mut PriceCache,
        today: DateKey,
        mode: RunMode,
    ) -> Result<PriceRecord, FetchFailure> {
        if let Some(record) = cache.get(ticker, today) {
            debug!(%ticker, "cache hit");
            self.stats.cache_hits += 1;
            return Ok(record.clone());
        }

        if !mode.is_online() {
            self.stats.failures += 1;
            note_stale(cache, ticker, today);
            return Err(FetchFailure::Offline);
        }

        if !self.pacing_delay.is_zero() {
            std::thread::sleep(self.pacing_delay);
        }

        self.stats.network_calls += 1;
        match self.provider.fetch_latest(ticker) {
            Ok(quote) => {
                let record = PriceRecord::new(quote.close, quote.info);
                cache.insert(ticker.clone(), today, record.clone());
                Ok(record)
            }
            Err(e) => {
                warn!(%ticker, provider = self.provider.name(), error = %e, "price lookup failed");
                self.stats.failures += 1;
                note_stale(cache, ticker, today);
                Err(FetchFailure::Fetch(e))
            }
        }
    }
}

/// Mention the last known price in the log. It is never used as today's value.
fn note_stale(cache: &PriceCache, ticker: &Ticker, today: DateKey) {
    if let Some((date, record)) = cache.latest_before(ticker, today) {
        warn!(
            %ticker,
            last_price = record.price,
            last_date = %date,
            "last known price is stale and will not be reported"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Quote;
    use serde_json::{json, Map};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Provider returning canned quotes and recording every call.
    struct ScriptedProvider {
        prices: HashMap<String, f64>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(prices: &[(&str, f64)]) -> Self {
            Self {
                prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PriceProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch_latest(&self, ticker: &Ticker) -> Result<Quote, PriceError> {
            self.calls.lock().unwrap().push(ticker.to_string());
            match self.prices.get(ticker.as_str()) {
                Some(price) => {
                    let mut info = Map::new();
                    info.insert("symbol".into(), json!(ticker.as_str()));
                    Ok(Quote { close: *price, info })
                }
                None => Err(PriceError::NetworkUnreachable("connection refused".into())),
            }
        }
    }

    fn today() -> DateKey {
        DateKey::parse("2024-01-05").unwrap()
    }

    #[test]
    fn cache_hit_makes_no_network_call() {
        let provider = ScriptedProvider::new(&[("7203.T", 9999.0)]);
        let mut fetcher = PriceFetcher::new(&provider, Duration::ZERO);
        let mut cache = PriceCache::new();
        cache.insert("7203.T".into(), today(), PriceRecord::new(2500.0, Map::new()));

        let record = fetcher
            .resolve(&"7203.T".into(), &mut cache, today(), RunMode::Online)
            .unwrap();

        assert_eq!(record.price, 2500.0);
        assert!(provider.calls().is_empty());
        assert_eq!(fetcher.stats().cache_hits, 1);
    }

    #[test]
    fn offline_miss_fails_without_network() {
        let provider = ScriptedProvider::new(&[("9999.T", 1.0)]);
        let mut fetcher = PriceFetcher::new(&provider, Duration::ZERO);
        let mut cache = PriceCache::new();

        let result = fetcher.resolve(&"9999.T".into(), &mut cache, today(), RunMode::Offline);

        assert!(matches!(result, Err(FetchFailure::Offline)));
        assert!(provider.calls().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn successful_fetch_is_folded_into_cache() {
        let provider = ScriptedProvider::new(&[("7203.T", 2500.0)]);
        let mut fetcher = PriceFetcher::new(&provider, Duration::ZERO);
        let mut cache = PriceCache::new();
        let ticker = Ticker::from("7203.T");

        let record = fetcher
            .resolve(&ticker, &mut cache, today(), RunMode::Online)
            .unwrap();

        assert_eq!(cache.get(&ticker, today()), Some(&record));
        assert_eq!(record.info["symbol"], "7203.T");
        assert_eq!(provider.calls(), vec!["7203.T"]);
    }

    #[test]
    fn failed_fetch_leaves_cache_untouched() {
        let provider = ScriptedProvider::new(&[]);
        let mut fetcher = PriceFetcher::new(&provider, Duration::ZERO);
        let mut cache = PriceCache::new();

        let result = fetcher.resolve(&"6758.T".into(), &mut cache, today(), RunMode::Online);

        assert!(matches!(result, Err(FetchFailure::Fetch(_))));
        assert!(cache.is_empty());
        assert_eq!(fetcher.stats().failures, 1);
        assert_eq!(fetcher.stats().network_calls, 1);
    }

    #[test]
    fn stale_entry_is_not_a_hit_for_today() {
        let provider = ScriptedProvider::new(&[]);
        let mut fetcher = PriceFetcher::new(&provider, Duration::ZERO);
        let mut cache = PriceCache::new();
        let yesterday = DateKey::parse("2024-01-04").unwrap();
        cache.insert("7203.T".into(), yesterday, PriceRecord::new(2400.0, Map::new()));

        let result = fetcher.resolve(&"7203.T".into(), &mut cache, today(), RunMode::Offline);

        assert!(result.is_err());
        assert_eq!(cache.record_count(), 1);
    }

    #[test]
    fn second_resolution_of_same_ticker_hits_cache() {
        let provider = ScriptedProvider::new(&[("7203.T", 2500.0)]);
        let mut fetcher = PriceFetcher::new(&provider, Duration::ZERO);
        let mut cache = PriceCache::new();
        let ticker = Ticker::from("7203.T");

        fetcher.resolve(&ticker, &mut cache, today(), RunMode::Online).unwrap();
        fetcher.resolve(&ticker, &mut cache, today(), RunMode::Online).unwrap();

        assert_eq!(provider.calls().len(), 1);
        assert_eq!(
            fetcher.stats(),
            FetchStats {
                cache_hits: 1,
                network_calls: 1,
                failures: 0
            }
        );
    }

    #[test]
    fn pacing_delay_applies_only_to_network_calls() {
        let provider = ScriptedProvider::new(&[("7203.T", 2500.0)]);
        let delay = Duration::from_millis(30);
        let mut fetcher = PriceFetcher::new(&provider, delay);
        let mut cache = PriceCache::new();
        let ticker = Ticker::from("7203.T");

        let start = std::time::Instant::now();
        fetcher.resolve(&ticker, &mut cache, today(), RunMode::Online).unwrap();
        assert!(start.elapsed() >= delay);

        let start = std::time::Instant::now();
        fetcher.resolve(&ticker, &mut cache, today(), RunMode::Online).unwrap();
        assert!(start.elapsed() < delay);
    }
}
