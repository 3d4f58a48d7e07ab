//! # formcomp-formula
//!
//! Formula parser for formcomp.
//!
//! This crate turns formula text into a [`FormulaExpr`] tree:
//! - A1 (`B3`, `$B$3`) and R1C1 (`R3C2`, `R[1]C[-1]`) references
//! - Sheet-qualified references and ranges (`'Rate Table'!A1:B4`)
//! - Operators with spreadsheet precedence
//! - A fixed catalogue of scalar functions and aggregators
//!
//! Errors carry the formula text and the position of the offending character.
//!
//! ## Example
//!
//! ```rust
//! use formcomp_formula::{parse_formula, FormulaExpr};
//!
//! let ast = parse_formula("=SUM(A1:A10)*2").unwrap();
//! assert_eq!(ast.to_string(), "(SUM(A1:A10) * 2)");
//!
//! let err = parse_formula("=FOO(1)").unwrap_err();
//! assert!(err.is_unsupported());
//! ```

pub mod ast;
pub mod error;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use functions::{Aggregator, Callable, Function, FunctionDef};
pub use parser::{parse_formula, parse_formula_with, ParseContext};
