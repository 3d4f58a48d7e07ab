//! # formcomp-core
//!
//! Core data structures for the formcomp formula compiler.
//!
//! This crate provides the raw cell table the compiler reads from:
//! - [`CellValue`] - Constants and formula text stored in cells
//! - [`CellAddress`], [`CellRange`] - A1 and R1C1 addressing
//! - [`CellIndex`], [`RangeIndex`] - Sheet-qualified zero-based positions
//! - [`Spreadsheet`], [`Sheet`] - Sheets of rows of cells plus defined names
//! - [`LoaderRegistry`] - Pluggable loaders producing a [`Spreadsheet`]
//!
//! ## Example
//!
//! ```rust
//! use formcomp_core::{CellValue, Spreadsheet};
//!
//! let mut book = Spreadsheet::new();
//! let sheet = book.sheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//! sheet.set_cell_value_at(1, 0, CellValue::string("label")).unwrap();
//!
//! book.define_name("Price", "A1").unwrap();
//! ```

pub mod cell;
pub mod error;
pub mod loader;
pub mod named_range;
pub mod sheet;
pub mod spreadsheet;

// Re-exports for convenience
pub use cell::{CellAddress, CellIndex, CellRange, CellValue, RangeIndex, ReferenceStyle};
pub use error::{Error, Result};
pub use loader::{LoaderRegistry, SpreadsheetLoader};
pub use named_range::{NameScope, NamedRange, NamedRangeCollection};
pub use sheet::Sheet;
pub use spreadsheet::Spreadsheet;

/// Maximum number of rows in a sheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
