//! Cache domain types: tickers, date keys, price records, and the per-day cache map.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange-qualified security identifier (`7203.T`, `AAPL`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ticker {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date key '{0}': expected YYYY-MM-DD")]
pub struct InvalidDateKey(pub String);

/// Calendar date used as a snapshot discriminator and inner cache key.
///
/// Always rendered as `YYYY-MM-DD`. Parsing is strict: exactly ten characters,
/// zero-padded, forming a real calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date on the local wall clock.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, InvalidDateKey> {
        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(InvalidDateKey(s.to_string()));
        }
        NaiveDate::parse_from_str(s, Self::FORMAT)
            .map(Self)
            .map_err(|_| InvalidDateKey(s.to_string()))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = InvalidDateKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DateKey {
    type Error = InvalidDateKey;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// One resolved price for a (ticker, date) pair.
///
/// `info` is the provider's metadata blob, stored and round-tripped verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub price: f64,
    #[serde(default)]
    pub info: Map<String, Value>,
}

impl PriceRecord {
    pub fn new(price: f64, info: Map<String, Value>) -> Self {
        Self { price, info }
    }
}

/// Ticker → (date → record). One instance maps to one snapshot file.
///
/// A cache loaded as a stale fallback carries entries keyed by older dates;
/// lookups for today's date never match those.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceCache {
    entries: BTreeMap<Ticker, BTreeMap<DateKey, PriceRecord>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ticker: &Ticker, date: DateKey) -> Option<&PriceRecord> {
        self.entries.get(ticker).and_then(|by_date| by_date.get(&date))
    }

    /// Insert (or wholesale replace) the record for `ticker` on `date`.
    pub fn insert(&mut self, ticker: Ticker, date: DateKey, record: PriceRecord) {
        self.entries.entry(ticker).or_default().insert(date, record);
    }

    pub fn contains_ticker(&self, ticker: &Ticker) -> bool {
        self.entries.contains_key(ticker)
    }

    /// Most recent record for `ticker` strictly before `date`.
    pub fn latest_before(&self, ticker: &Ticker, date: DateKey) -> Option<(DateKey, &PriceRecord)> {
        self.entries
            .get(ticker)?
            .range(..date)
            .next_back()
            .map(|(d, r)| (*d, r))
    }

    pub fn tickers(&self) -> impl Iterator<Item = &Ticker> {
        self.entries.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ticker_count(&self) -> usize {
        self.entries.len()
    }

    pub fn record_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Only the records keyed by `date`; tickers with none are dropped.
    pub fn on_date(&self, date: DateKey) -> PriceCache {
        let mut day = PriceCache::new();
        for (ticker, by_date) in &self.entries {
            if let Some(record) = by_date.get(&date) {
                day.insert(ticker.clone(), date, record.clone());
            }
        }
        day
    }
}
