//! Workbook abstraction and the ticker/price column contract.
//!
//! Rows are 1-based like a spreadsheet UI; columns are addressed by letters.

use crate::cache::Ticker;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("workbook I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workbook format error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid column '{0}': expected letters such as B or AA")]
    InvalidColumn(String),

    #[error("invalid row {0}: rows start at 1")]
    InvalidRow(usize),
}

/// A spreadsheet column, zero-based internally (`A` = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(usize);

impl Column {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn from_letters(letters: &str) -> Result<Self, SheetError> {
        let trimmed = letters.trim();
        if trimmed.is_empty() || trimmed.len() > 3 {
            return Err(SheetError::InvalidColumn(letters.to_string()));
        }
        let mut n = 0usize;
        for c in trimmed.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(SheetError::InvalidColumn(letters.to_string()));
            }
            n = n * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
        }
        Ok(Self(n - 1))
    }
}

impl FromStr for Column {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_letters(s)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut n = self.0 + 1;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        letters.iter().rev().try_for_each(|c| write!(f, "{c}"))
    }
}

/// Cell content as the core sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Empty cells and whitespace-only text end the ticker column.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(_) => false,
            CellValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// A handle on one sheet of a workbook.
pub trait Workbook {
    /// Value at (`row`, `column`); out-of-range cells are `Empty`.
    fn cell(&self, row: usize, column: Column) -> CellValue;

    fn set_cell(&mut self, row: usize, column: Column, value: CellValue) -> Result<(), SheetError>;

    /// Persist pending changes.
    fn save(&mut self) -> Result<(), SheetError>;
}

/// Where tickers are read and prices written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub start_row: usize,
    pub ticker_column: Column,
    pub price_column: Column,
}

/// Turn a raw code cell into a ticker.
///
/// Numeric codes are truncated to an integer and given the market suffix
/// (`7203`, `7203.0`, `"7203"` → `7203.T`); anything else is trimmed and
/// used verbatim.
pub fn normalize_code(cell: &CellValue, market_suffix: &str) -> Option<Ticker> {
    let numeric = |n: f64| Ticker::new(format!("{}{market_suffix}", n.trunc() as i64));
    match cell {
        CellValue::Empty => None,
        CellValue::Number(n) if n.is_finite() => Some(numeric(*n)),
        CellValue::Number(n) => Some(Ticker::new(n.to_string())),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Some(numeric(n)),
                _ => Some(Ticker::new(trimmed)),
            }
        }
    }
}

/// Tickers from `layout.ticker_column`, starting at `layout.start_row`,
/// stopping at the first blank cell. Order and duplicates are preserved.
pub fn read_tickers(book: &dyn Workbook, layout: &SheetLayout, market_suffix: &str) -> Vec<Ticker> {
    (layout.start_row..)
        .map(|row| book.cell(row, layout.ticker_column))
        .map_while(|cell| normalize_code(&cell, market_suffix))
        .collect()
}

/// Write one value per row into `layout.price_column`, in read order.
pub fn write_prices(
    book: &mut dyn Workbook,
    layout: &SheetLayout,
    values: &[CellValue],
) -> Result<(), SheetError> {
    for (offset, value) in values.iter().enumerate() {
        book.set_cell(layout.start_row + offset, layout.price_column, value.clone())?;
    }
    Ok(())
}
