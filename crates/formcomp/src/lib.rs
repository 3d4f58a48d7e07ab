//! # formcomp
//!
//! Compile spreadsheet formulas into directly executable computations.
//!
//! A spreadsheet supplies the logic; the host program supplies typed inputs and reads typed
//! outputs. Formulas are parsed, bound to the host's contract, simplified once, and then
//! evaluated without touching formula text again.
//!
//! ## Features
//!
//! - A1 and R1C1 formulas, defined names, multiple sheets
//! - Repeating sections bound to host collections
//! - Aggregators (`SUM`, `AVERAGE`, `STDEV`, ...) rewritten into primitive folds
//! - Constant folding, sharing of identical subexpressions and inlining of intermediates
//! - Double, decimal and scaled-integer arithmetic
//!
//! ## Example
//!
//! ```rust
//! use formcomp::prelude::*;
//!
//! let mut book = Spreadsheet::new();
//! let sheet = book.sheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 0.1).unwrap();
//! sheet.set_cell_value("B1", 0.05).unwrap();
//! sheet.set_cell_formula("C1", "=MAX(A1,B1)").unwrap();
//!
//! let config = CompilerConfig::default().with_numeric_type("decimal:2".parse().unwrap());
//! let mut builder = EngineBuilder::with_config(
//!     &book,
//!     Shape::new(),
//!     Shape::new().value("RebateOp", DataType::String),
//!     config,
//! )
//! .unwrap();
//! builder.output("C1", "RebateOp").unwrap();
//! let engine = builder.build().unwrap();
//!
//! let record = Record::new();
//! let computation = engine.computation(&record);
//! assert_eq!(computation.get("rebateop").unwrap(), Value::text("0.1"));
//! ```

pub mod builder;
pub mod prelude;

pub use builder::EngineBuilder;

// Re-export core types
pub use formcomp_core::{
    CellAddress, CellIndex, CellRange, CellValue, Error, LoaderRegistry, NamedRange,
    RangeIndex, ReferenceStyle, Result, Sheet, Spreadsheet, SpreadsheetLoader,
};

// Re-export formula types
pub use formcomp_formula::{
    parse_formula, Aggregator, FormulaExpr, Function, ParseContext, ParseError, ParseErrorKind,
};

// Re-export compiler types
pub use formcomp_compiler::{
    CompilerConfig, CompilerError, CompilerResult, Computation, ComputationModel,
    ComputationOptions, DataType, Engine, EvalError, EvalResult, Inputs, Number, NumericError,
    NumericType, NumericTypeSpec, Orientation, Record, RoundingMode, SectionKey, SectionRow,
    Shape, Value,
};
