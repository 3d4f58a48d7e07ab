//! Sheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet: rows of cells, stored sparsely
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    /// Non-empty cells keyed by row, then column
    rows: BTreeMap<u32, BTreeMap<u16, CellValue>>,
}

impl Sheet {
    /// Create a new sheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get a cell by row and column indices; `None` for absent cells
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.rows.get(&row).and_then(|cells| cells.get(&col))
    }

    /// Get cell value by address string (e.g., "A1")
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col).cloned().unwrap_or(CellValue::Empty)
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    ///
    /// Setting [`CellValue::Empty`] removes the cell.
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        Self::validate_cell_position(row, col)?;
        let value = value.into();
        if value.is_empty() {
            self.clear_cell_at(row, col);
        } else {
            self.rows.entry(row).or_default().insert(col, value);
        }
        Ok(())
    }

    /// Set an A1-style formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, CellValue::formula(Self::with_equals(formula)))
    }

    /// Set an R1C1-style formula by address string
    pub fn set_cell_formula_r1c1(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(
            addr.row,
            addr.col,
            CellValue::formula_r1c1(Self::with_equals(formula)),
        )
    }

    fn with_equals(formula: &str) -> String {
        if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        }
    }

    /// Clear a cell by indices
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        if let Some(cells) = self.rows.get_mut(&row) {
            cells.remove(&col);
            if cells.is_empty() {
                self.rows.remove(&row);
            }
        }
    }

    // === Range Operations ===

    /// Iterate over non-empty cells row by row
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.rows
            .iter()
            .flat_map(|(row, cells)| cells.iter().map(move |(col, v)| (*row, *col, v)))
    }

    /// Iterate over the non-empty cells inside `range`, row by row
    ///
    /// Only stored cells are visited, so the cost does not depend on the size of the range.
    pub fn cells_in(&self, range: CellRange) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        let (start, end) = (range.start, range.end);
        let (first_row, last_row) = (start.row.min(end.row), start.row.max(end.row));
        let (first_col, last_col) = (start.col.min(end.col), start.col.max(end.col));
        self.rows
            .range(first_row..=last_row)
            .flat_map(move |(row, cells)| {
                cells
                    .range(first_col..=last_col)
                    .map(move |(col, v)| (*row, *col, v))
            })
    }

    /// Get the used range (bounds of all non-empty cells)
    pub fn used_range(&self) -> Option<CellRange> {
        let first_row = *self.rows.keys().next()?;
        let last_row = *self.rows.keys().next_back()?;
        let first_col = self.rows.values().filter_map(|c| c.keys().next()).min()?;
        let last_col = self
            .rows
            .values()
            .filter_map(|c| c.keys().next_back())
            .max()?;
        Some(CellRange::from_indices(
            first_row, *first_col, last_row, *last_col,
        ))
    }

    fn validate_cell_position(row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}
