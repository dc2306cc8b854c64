//! Read-cache resolution for "as of today".
//!
//! 1. Today's snapshot, if it exists and is non-empty
//! 2. Otherwise the newest snapshot dated strictly before today
//! 3. Otherwise an empty cache
//!
//! Whatever is returned is used for reads; the run always writes back to
//! today's snapshot, never to the fallback file.

use super::store::{CacheError, CacheStore, SnapshotFile};
use super::types::{DateKey, PriceCache};
use std::fmt;
use tracing::{info, warn};

/// Which snapshot the active read-cache came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Today(DateKey),
    Fallback(DateKey),
    Empty,
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheSource::Today(date) => write!(f, "today's snapshot ({date})"),
            CacheSource::Fallback(date) => write!(f, "fallback snapshot ({date})"),
            CacheSource::Empty => f.write_str("empty cache"),
        }
    }
}

/// The active read-cache plus its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedCache {
    pub cache: PriceCache,
    pub source: CacheSource,
}

pub struct CacheResolver<'a> {
    store: &'a CacheStore,
}

impl<'a> CacheResolver<'a> {
    pub fn new(store: &'a CacheStore) -> Self {
        Self { store }
    }

    /// Pick the read-cache for `today`.
    ///
    /// A malformed file that is selected (today's or the fallback) is an
    /// error; only the directory scan is lenient about names.
    pub fn resolve(&self, today: DateKey) -> Result<ResolvedCache, CacheError> {
        let cache = self.store.load(today)?;
        if !cache.is_empty() {
            return Ok(ResolvedCache {
                cache,
                source: CacheSource::Today(today),
            });
        }

        match self.latest_snapshot_before(today)? {
            Some(snapshot) => {
                let cache = self.store.load_path(&snapshot.path)?;
                warn!(
                    today = %today,
                    fallback = %snapshot.date,
                    tickers = cache.ticker_count(),
                    "today's cache is missing or empty, reading stale snapshot"
                );
                Ok(ResolvedCache {
                    cache,
                    source: CacheSource::Fallback(snapshot.date),
                })
            }
            None => {
                info!(today = %today, "no cache snapshot available, starting empty");
                Ok(ResolvedCache {
                    cache: PriceCache::new(),
                    source: CacheSource::Empty,
                })
            }
        }
    }

    /// Newest snapshot dated strictly before `today`. Future-dated files are ignored.
    pub fn latest_snapshot_before(&self, today: DateKey) -> Result<Option<SnapshotFile>, CacheError> {
        let snapshots = self.store.list_snapshots()?;
        Ok(snapshots.into_iter().rev().find(|s| s.date < today))
    }
}
