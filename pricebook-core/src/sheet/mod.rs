//! Spreadsheet collaborator: workbook trait, ticker/price column contract, CSV adapter

pub mod csv_workbook;
pub mod workbook;

pub use csv_workbook::CsvWorkbook;
pub use workbook::{
    normalize_code, read_tickers, write_prices, CellValue, Column, SheetError, SheetLayout,
    Workbook,
};
