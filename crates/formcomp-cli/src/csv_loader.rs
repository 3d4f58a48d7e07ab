//! CSV spreadsheets
//!
//! Every record becomes a row of `Sheet1`. Fields starting with `=` are A1-style formulas,
//! numbers and `TRUE`/`FALSE` are typed, anything else is text and empty fields stay empty.

use std::io::Read;

use formcomp::{CellValue, Error, Result, Spreadsheet, SpreadsheetLoader};

/// Loads headerless CSV files with formulas in their cells
#[derive(Debug, Clone)]
pub struct CsvLoader {
    delimiter: u8,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn detect_type(field: &str) -> CellValue {
        let field = field.trim();

        if field.is_empty() {
            return CellValue::Empty;
        }
        if field.starts_with('=') {
            return CellValue::formula(field);
        }
        if field.eq_ignore_ascii_case("true") {
            return CellValue::Boolean(true);
        }
        if field.eq_ignore_ascii_case("false") {
            return CellValue::Boolean(false);
        }
        if let Ok(n) = field.parse::<f64>() {
            return CellValue::Number(n);
        }
        CellValue::string(field)
    }
}

impl SpreadsheetLoader for CsvLoader {
    fn name(&self) -> &str {
        "csv"
    }

    fn extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn load(&self, reader: &mut dyn Read, source_name: &str) -> Result<Spreadsheet> {
        let load_error = |e: csv::Error| Error::Load {
            source_name: source_name.to_string(),
            message: e.to_string(),
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut book = Spreadsheet::new();
        let sheet = book
            .sheet_mut(0)
            .ok_or_else(|| Error::other("new spreadsheet has no sheet"))?;

        for (row, record) in csv_reader.records().enumerate() {
            let record = record.map_err(load_error)?;
            for (col, field) in record.iter().enumerate() {
                sheet.set_cell_value_at(row as u32, col as u16, Self::detect_type(field))?;
            }
        }

        Ok(book)
    }
}
