//! Spreadsheet type - the raw cell table handed to the compiler

use crate::cell::{CellIndex, CellRange, CellValue, RangeIndex};
use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::sheet::Sheet;
use crate::MAX_SHEET_NAME_LEN;

/// A spreadsheet: an ordered list of sheets plus defined names
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    sheets: Vec<Sheet>,
    names: NamedRangeCollection,
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Spreadsheet {
    /// Create a spreadsheet with a single empty sheet named `Sheet1`
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new("Sheet1")],
            names: NamedRangeCollection::new(),
        }
    }

    /// Create a spreadsheet with no sheets
    pub fn empty() -> Self {
        Self {
            sheets: Vec::new(),
            names: NamedRangeCollection::new(),
        }
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    /// Get the index of a sheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).and_then(|i| self.sheets.get(i))
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Add a new sheet and return its index
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name)?;
        self.sheets.push(Sheet::new(name));
        Ok(self.sheets.len() - 1)
    }

    /// Add an already populated sheet, keeping its name
    pub fn add_existing_sheet(&mut self, sheet: Sheet) -> Result<usize> {
        self.validate_sheet_name(sheet.name())?;
        self.sheets.push(sheet);
        Ok(self.sheets.len() - 1)
    }

    /// Rename a sheet
    pub fn rename_sheet(&mut self, index: usize, name: &str) -> Result<()> {
        if index >= self.sheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.sheets.len()));
        }
        self.validate_sheet_name(name)?;
        self.sheets[index].set_name(name);
        Ok(())
    }

    /// Get the content of a cell; absent cells and unknown sheets read as `None`
    pub fn cell(&self, index: CellIndex) -> Option<&CellValue> {
        self.sheets
            .get(index.sheet)
            .and_then(|s| s.cell_at(index.row, index.col))
    }

    /// Non-empty cells inside a range, row by row; a range on an unknown sheet has none
    pub fn cells_in(&self, range: RangeIndex) -> impl Iterator<Item = CellIndex> + '_ {
        let sheet = range.sheet;
        self.sheets.get(sheet).into_iter().flat_map(move |s| {
            s.cells_in(range.to_cell_range())
                .map(move |(row, col, _)| CellIndex::new(sheet, row, col))
        })
    }

    /// Get the name of the sheet a cell lives on, for diagnostics
    pub fn describe_cell(&self, index: CellIndex) -> String {
        match self.sheets.get(index.sheet) {
            Some(sheet) if self.sheets.len() > 1 => format!("{}!{}", sheet.name(), index),
            _ => index.to_string(),
        }
    }

    // ==================== Defined Names ====================

    /// Define a workbook-scoped name
    ///
    /// # Example
    /// ```
    /// use formcomp_core::Spreadsheet;
    ///
    /// let mut book = Spreadsheet::new();
    /// book.define_name("Rate", "Sheet1!$B$1").unwrap();
    /// assert!(book.resolve_name("rate", 0).unwrap().is_some());
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Workbook)
    }

    /// Define a sheet-scoped name
    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Sheet(sheet_index))
    }

    fn define_name_with_scope(&mut self, name: &str, refers_to: &str, scope: NameScope) -> Result<()> {
        let default_sheet = match scope {
            NameScope::Sheet(idx) => idx,
            NameScope::Workbook => 0,
        };
        // Reject unresolvable references up front
        self.resolve_reference(refers_to.trim_start_matches('='), default_sheet)?;
        self.names.define(NamedRange::new(name, refers_to, scope))
    }

    /// Get the defined names
    pub fn names(&self) -> &NamedRangeCollection {
        &self.names
    }

    /// Resolve a defined name as seen from `current_sheet`
    pub fn resolve_name(&self, name: &str, current_sheet: usize) -> Result<Option<RangeIndex>> {
        let Some(named) = self.names.get(name, current_sheet) else {
            return Ok(None);
        };
        let default_sheet = match named.scope {
            NameScope::Sheet(idx) => idx,
            NameScope::Workbook => 0,
        };
        self.resolve_reference(named.expression(), default_sheet)
            .map(Some)
    }

    /// Resolve reference text such as `B2`, `$A$1:$C$3` or `'My Sheet'!A1`
    pub fn resolve_reference(&self, text: &str, current_sheet: usize) -> Result<RangeIndex> {
        let text = text.trim();
        let (sheet, range_text) = match text.rfind('!') {
            Some(pos) => {
                let sheet_name = text[..pos].trim_matches('\'');
                let sheet = self
                    .sheet_index(sheet_name)
                    .ok_or_else(|| Error::SheetNotFound(sheet_name.to_string()))?;
                (sheet, &text[pos + 1..])
            }
            None => (current_sheet, text),
        };

        if sheet >= self.sheets.len() {
            return Err(Error::SheetOutOfBounds(sheet, self.sheets.len()));
        }

        let range = CellRange::parse(range_text)
            .map_err(|_| Error::InvalidRange(text.to_string()))?;
        Ok(RangeIndex::from_range(sheet, range))
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.len() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']', '!'];
        if let Some(c) = INVALID_CHARS.iter().find(|c| name.contains(**c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        if self.sheet_index(name).is_some() {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}
