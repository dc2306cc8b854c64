//! Daily price cache: snapshot files, stale fallback, and domain types

pub mod resolver;
pub mod store;
pub mod types;

pub use resolver::{CacheResolver, CacheSource, ResolvedCache};
pub use store::{CacheError, CacheStore, SnapshotFile};
pub use types::{DateKey, InvalidDateKey, PriceCache, PriceRecord, Ticker};
