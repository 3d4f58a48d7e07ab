//! Cell-related types

mod address;
mod index;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator, ReferenceStyle};
pub use index::{CellIndex, RangeIndex};
pub use value::{excel_serial, CellValue};
