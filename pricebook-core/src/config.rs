//! Run configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. `validate()` runs after parsing.

use crate::sheet::{Column, SheetLayout};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBookConfig {
    pub cache: CacheConfig,
    pub workbook: WorkbookConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the `yf_cache_<date>.json` snapshots.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookConfig {
    pub path: PathBuf,
    /// First data row, 1-based.
    pub start_row: usize,
    pub ticker_column: String,
    pub price_column: String,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("portfolio.csv"),
            start_row: 5,
            ticker_column: "B".into(),
            price_column: "I".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Wait before every network lookup.
    pub pacing_delay_ms: u64,
    pub timeout_secs: u64,
    /// Appended to numeric codes (`7203` → `7203.T`).
    pub market_suffix: String,
    /// Written in place of a price when a ticker cannot be resolved.
    pub failure_sentinel: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: 1500,
            timeout_secs: 30,
            market_suffix: ".T".into(),
            failure_sentinel: "fetch failed".into(),
        }
    }
}

/// `<platform cache dir>/pricebook`, or `./yf_cache` when the platform has none.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("pricebook"))
        .unwrap_or_else(|| PathBuf::from("yf_cache"))
}

impl PriceBookConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = self.layout()?;
        if layout.ticker_column == layout.price_column {
            return Err(ConfigError::Invalid(format!(
                "ticker_column and price_column are both {}",
                layout.ticker_column
            )));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.fetch.failure_sentinel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "failure_sentinel must not be blank".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<SheetLayout, ConfigError> {
        if self.workbook.start_row == 0 {
            return Err(ConfigError::Invalid("start_row is 1-based".into()));
        }
        let column = |letters: &str| {
            Column::from_letters(letters).map_err(|e| ConfigError::Invalid(e.to_string()))
        };
        Ok(SheetLayout {
            start_row: self.workbook.start_row,
            ticker_column: column(&self.workbook.ticker_column)?,
            price_column: column(&self.workbook.price_column)?,
        })
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.fetch.pacing_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}
