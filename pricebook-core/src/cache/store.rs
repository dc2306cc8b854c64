//! Day-snapshot persistence.
//!
//! Layout: `{cache_dir}/yf_cache_{YYYY-MM-DD}.json`, one file per calendar day.
//!
//! - Atomic writes (write to `.json.tmp`, rename into place)
//! - Missing file or empty JSON (`null`, `{}`, `[]`) loads as an empty cache;
//!   malformed content is an error
//! - Directory scans skip names that do not parse as a snapshot

use super::types::{DateKey, PriceCache};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const SNAPSHOT_PREFIX: &str = "yf_cache_";
pub const SNAPSHOT_SUFFIX: &str = ".json";

/// Errors from the cache store and resolver. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache path exists but is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed cache file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cache for {date}: {source}")]
    Serialize {
        date: DateKey,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File name for a day's snapshot: `yf_cache_2024-01-05.json`.
pub fn snapshot_file_name(date: DateKey) -> String {
    format!("{SNAPSHOT_PREFIX}{date}{SNAPSHOT_SUFFIX}")
}

/// Inverse of [`snapshot_file_name`]. `None` for anything else.
pub fn parse_snapshot_file_name(name: &str) -> Option<DateKey> {
    let date = name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)?;
    DateKey::parse(date).ok()
}

/// A snapshot file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub date: DateKey,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// The per-day JSON snapshot store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the snapshot for `date`. No I/O.
    pub fn path_for(&self, date: DateKey) -> PathBuf {
        self.cache_dir.join(snapshot_file_name(date))
    }

    /// Create the cache directory if it does not exist.
    pub fn ensure_directory(&self) -> Result<(), CacheError> {
        match fs::metadata(&self.cache_dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CacheError::NotADirectory {
                path: self.cache_dir.clone(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(&self.cache_dir)
                .map_err(|e| CacheError::io(&self.cache_dir, e)),
            Err(e) => Err(CacheError::io(&self.cache_dir, e)),
        }
    }

    /// Load the snapshot for `date`; an absent file is an empty cache.
    pub fn load(&self, date: DateKey) -> Result<PriceCache, CacheError> {
        self.load_path(&self.path_for(date))
    }

    pub(crate) fn load_path(&self, path: &Path) -> Result<PriceCache, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PriceCache::new()),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let parse_error = |source: serde_json::Error| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let value: Value = serde_json::from_str(&content).map_err(parse_error)?;
        if is_empty_json(&value) {
            return Ok(PriceCache::new());
        }
        serde_json::from_value(value).map_err(parse_error)
    }

    /// Write the full cache as `date`'s snapshot, replacing any existing file.
    ///
    /// The content is serialized before anything touches the disk, then
    /// written to a `.tmp` sibling and renamed over the target.
    pub fn save(&self, cache: &PriceCache, date: DateKey) -> Result<PathBuf, CacheError> {
        let mut json = serde_json::to_string_pretty(cache)
            .map_err(|source| CacheError::Serialize { date, source })?;
        json.push('\n');

        let path = self.path_for(date);
        let tmp_path = path.with_extension("json.tmp");

        write_synced(&tmp_path, json.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::io(&tmp_path, e)
        })?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::io(&path, e)
        })?;

        Ok(path)
    }

    /// Every snapshot in the cache directory, sorted by date ascending.
    ///
    /// Names that do not parse as a snapshot are skipped. A missing directory
    /// lists as empty.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotFile>, CacheError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.cache_dir, e)),
        };

        let mut snapshots = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.cache_dir, e))?;
            let path = entry.path();
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            let Some(date) = parse_snapshot_file_name(name) else {
                if name.starts_with(SNAPSHOT_PREFIX) {
                    debug!(file = %path.display(), "skipping cache file with unparseable date");
                }
                continue;
            };

            let meta = entry.metadata().map_err(|e| CacheError::io(&path, e))?;
            if !meta.is_file() {
                continue;
            }

            snapshots.push(SnapshotFile {
                date,
                path,
                size_bytes: meta.len(),
            });
        }

        snapshots.sort_by_key(|s| s.date);
        Ok(snapshots)
    }

    /// Delete the snapshot for `date`.
    pub fn remove(&self, date: DateKey) -> Result<(), CacheError> {
        let path = self.path_for(date);
        fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))
    }
}

/// `null`, `{}` and `[]` all mean "nothing cached".
fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::PriceRecord;
    use serde_json::{json, Map};

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn sample_cache() -> PriceCache {
        let mut info = Map::new();
        info.insert("exchangeName".into(), json!("JPX"));
        info.insert("regularMarketPrice".into(), json!(2500.0));
        let mut cache = PriceCache::new();
        cache.insert("7203.T".into(), key("2024-01-05"), PriceRecord::new(2500.0, info));
        cache
    }

    #[test]
    fn path_for_uses_snapshot_naming() {
        let store = CacheStore::new("/var/cache/prices");
        assert_eq!(
            store.path_for(key("2024-01-05")),
            PathBuf::from("/var/cache/prices/yf_cache_2024-01-05.json")
        );
    }

    #[test]
    fn snapshot_names_parse_strictly() {
        assert_eq!(
            parse_snapshot_file_name("yf_cache_2023-12-29.json"),
            Some(key("2023-12-29"))
        );
        assert_eq!(parse_snapshot_file_name("yf_cache_notadate.json"), None);
        assert_eq!(parse_snapshot_file_name("yf_cache_2023-12-29.json.tmp"), None);
        assert_eq!(parse_snapshot_file_name("cache_2023-12-29.json"), None);
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path().join("nested/cache"));

        store.ensure_directory().unwrap();
        store.ensure_directory().unwrap();
        assert!(store.cache_dir().is_dir());
    }

    #[test]
    fn ensure_directory_rejects_regular_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache");
        fs::write(&path, b"not a dir").unwrap();

        let err = CacheStore::new(&path).ensure_directory().unwrap_err();
        assert!(matches!(err, CacheError::NotADirectory { .. }));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());

        let cache = store.load(key("2024-01-05")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn load_malformed_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        fs::write(store.path_for(key("2024-01-05")), "{ \"7203.T\": ").unwrap();

        let err = store.load(key("2024-01-05")).unwrap_err();
        assert!(matches!(err, CacheError::Parse { .. }));
    }

    #[test]
    fn empty_json_values_load_as_empty_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        let today = key("2024-01-05");

        for body in ["null", "{}", "[]", " null\n"] {
            fs::write(store.path_for(today), body).unwrap();
            assert!(store.load(today).unwrap().is_empty(), "body {body:?}");
        }

        for body in ["[1]", "42", "\"x\""] {
            fs::write(store.path_for(today), body).unwrap();
            assert!(matches!(store.load(today), Err(CacheError::Parse { .. })), "body {body:?}");
        }
    }

    #[test]
    fn save_then_load_and_no_temp_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        let cache = sample_cache();

        let path = store.save(&cache, key("2024-01-05")).unwrap();
        assert_eq!(path, store.path_for(key("2024-01-05")));
        assert_eq!(store.load(key("2024-01-05")).unwrap(), cache);

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn save_overwrites_existing_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        store.save(&sample_cache(), key("2024-01-05")).unwrap();

        store.save(&PriceCache::new(), key("2024-01-05")).unwrap();
        assert!(store.load(key("2024-01-05")).unwrap().is_empty());
    }

    #[test]
    fn saved_file_is_pretty_utf8_json() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        let mut cache = PriceCache::new();
        let mut info = Map::new();
        info.insert("longName".into(), json!("トヨタ自動車"));
        cache.insert("7203.T".into(), key("2024-01-05"), PriceRecord::new(1.0, info));

        let path = store.save(&cache, key("2024-01-05")).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("トヨタ自動車"));
        assert!(text.contains("\n  \"7203.T\""));
    }

    #[test]
    fn list_snapshots_sorted_and_skips_noise() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        store.save(&sample_cache(), key("2024-01-05")).unwrap();
        store.save(&PriceCache::new(), key("2023-12-29")).unwrap();
        fs::write(tmp.path().join("yf_cache_notadate.json"), "{}").unwrap();
        fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        fs::create_dir(tmp.path().join("yf_cache_2024-01-06.json")).unwrap();

        let snapshots = store.list_snapshots().unwrap();
        let dates: Vec<String> = snapshots.iter().map(|s| s.date.to_string()).collect();
        assert_eq!(dates, vec!["2023-12-29", "2024-01-05"]);
        assert!(snapshots[1].size_bytes > snapshots[0].size_bytes);
    }

    #[test]
    fn list_snapshots_on_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path().join("absent"));
        assert!(store.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn remove_deletes_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        store.save(&sample_cache(), key("2024-01-05")).unwrap();

        store.remove(key("2024-01-05")).unwrap();
        assert!(!store.path_for(key("2024-01-05")).exists());
        assert!(store.remove(key("2024-01-05")).is_err());
    }
}
