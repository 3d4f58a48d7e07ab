//! Sheet-qualified cell positions

use std::fmt;

use super::address::{CellAddress, CellRange};

/// Position of a single cell in a [`Spreadsheet`](crate::Spreadsheet)
///
/// All components are 0-based. A1 and R1C1 references to the same cell resolve to the same
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellIndex {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellIndex {
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// The same position on a sheet, dropping `$` markers
    pub fn from_address(sheet: usize, addr: CellAddress) -> Self {
        Self::new(sheet, addr.row, addr.col)
    }

    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }

    /// Move by a row and column delta; `None` if the result leaves the sheet
    pub fn offset(&self, rows: i64, cols: i64) -> Option<Self> {
        let row = u32::try_from(self.row as i64 + rows).ok()?;
        let col = u16::try_from(self.col as i64 + cols).ok()?;
        Some(Self::new(self.sheet, row, col))
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address().to_a1_string())
    }
}

/// A rectangular block of cells on one sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeIndex {
    pub sheet: usize,
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl RangeIndex {
    /// Create a range, normalizing the corners
    pub fn new(sheet: usize, row_a: u32, col_a: u16, row_b: u32, col_b: u16) -> Self {
        Self {
            sheet,
            first_row: row_a.min(row_b),
            first_col: col_a.min(col_b),
            last_row: row_a.max(row_b),
            last_col: col_a.max(col_b),
        }
    }

    pub fn from_range(sheet: usize, range: CellRange) -> Self {
        Self::new(
            sheet,
            range.start.row,
            range.start.col,
            range.end.row,
            range.end.col,
        )
    }

    pub fn single(cell: CellIndex) -> Self {
        Self::new(cell.sheet, cell.row, cell.col, cell.row, cell.col)
    }

    pub fn top_left(&self) -> CellIndex {
        CellIndex::new(self.sheet, self.first_row, self.first_col)
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }

    pub fn row_count(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn col_count(&self) -> u16 {
        self.last_col - self.first_col + 1
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        cell.sheet == self.sheet
            && cell.row >= self.first_row
            && cell.row <= self.last_row
            && cell.col >= self.first_col
            && cell.col <= self.last_col
    }

    /// Check whether `other` lies entirely within this range
    pub fn contains_range(&self, other: &RangeIndex) -> bool {
        self.contains(other.top_left())
            && self.contains(CellIndex::new(other.sheet, other.last_row, other.last_col))
    }

    pub fn overlaps(&self, other: &RangeIndex) -> bool {
        self.sheet == other.sheet
            && self.first_row <= other.last_row
            && self.last_row >= other.first_row
            && self.first_col <= other.last_col
            && self.last_col >= other.first_col
    }

    /// Iterate over all cells in the range (row by row)
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        (self.first_row..=self.last_row).flat_map(move |row| {
            (self.first_col..=self.last_col).map(move |col| CellIndex::new(self.sheet, row, col))
        })
    }

    pub fn to_cell_range(&self) -> CellRange {
        CellRange::from_indices(self.first_row, self.first_col, self.last_row, self.last_col)
    }
}

impl fmt::Display for RangeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_cell_range().to_a1_string())
    }
}
