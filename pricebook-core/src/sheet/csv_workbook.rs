//! CSV-backed workbook.
//!
//! The whole file is held as a grid of strings. Cells that parse as finite
//! numbers read back as `Number`; everything else is `Text`. Once a cell has
//! been set, saving pads rows to a common width and rewrites the file atomically (write to `.tmp`, rename
//! into place).
//!
//! Fully empty lines in the input are skipped by the reader, so a sheet
//! exported with blank separator lines shifts its row numbers.

use super::workbook::{CellValue, Column, SheetError, Workbook};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvWorkbook {
    path: PathBuf,
    rows: Vec<Vec<String>>,
    dirty: bool,
}

impl CsvWorkbook {
    /// Read every record of `path`. Ragged rows are allowed; there is no header.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SheetError> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|source| SheetError::Csv {
                path: path.clone(),
                source,
            })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| SheetError::Csv {
                path: path.clone(),
                source,
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            path,
            rows,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True once a cell has been set since the last open or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn csv_error(&self, source: csv::Error) -> SheetError {
        SheetError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(raw.to_string()),
    }
}

impl Workbook for CsvWorkbook {
    fn cell(&self, row: usize, column: Column) -> CellValue {
        row.checked_sub(1)
            .and_then(|r| self.rows.get(r))
            .and_then(|cells| cells.get(column.index()))
            .map(|raw| parse_cell(raw))
            .unwrap_or(CellValue::Empty)
    }

    fn set_cell(&mut self, row: usize, column: Column, value: CellValue) -> Result<(), SheetError> {
        let r = row.checked_sub(1).ok_or(SheetError::InvalidRow(row))?;
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= column.index() {
            cells.resize(column.index() + 1, String::new());
        }
        cells[column.index()] = value.to_string();
        self.dirty = true;
        Ok(())
    }

    /// Rewrites the file only when a cell has changed.
    fn save(&mut self) -> Result<(), SheetError> {
        if !self.dirty {
            return Ok(());
        }

        // Zero-field records would be written as empty lines and vanish on reload.
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        for row in &mut self.rows {
            row.resize(width, String::new());
        }

        let tmp_path = self.path.with_extension("csv.tmp");

        let write = || -> Result<(), SheetError> {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_path(&tmp_path)
                .map_err(|e| self.csv_error(e))?;
            for row in &self.rows {
                writer.write_record(row).map_err(|e| self.csv_error(e))?;
            }
            writer.flush().map_err(|source| SheetError::Io {
                path: tmp_path.clone(),
                source,
            })
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            SheetError::Io {
                path: self.path.clone(),
                source,
            }
        })?;
        self.dirty = false;
        Ok(())
    }
}
