//! # formcomp-compiler
//!
//! Computation model, transformation pipeline and evaluation engine for formcomp.
//!
//! This crate turns a bound spreadsheet into something a host can run:
//! - [`SpreadsheetBinder`] - Connect cells to the host's input/output [`Shape`]s
//! - [`ComputationModel`] - Sections, cells and an arena of [`ExprNode`]s
//! - [`ModelTransformer`] - Rewrite, annotate, fold, share and inline
//! - [`Engine`] - Evaluate outputs for one input object at a time
//! - [`NumericType`] - Double, decimal or scaled-integer arithmetic
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use formcomp_compiler::{
//!     CompilerConfig, DataType, Engine, ModelTransformer, Record, Shape, SpreadsheetBinder, Value,
//! };
//! use formcomp_core::Spreadsheet;
//!
//! let mut book = Spreadsheet::new();
//! let sheet = book.sheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 1.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//!
//! let config = CompilerConfig::default();
//! let numeric = config.numeric_type.build().unwrap();
//! let mut binder = SpreadsheetBinder::new(
//!     &book,
//!     Shape::new().value("a", DataType::Numeric),
//!     Shape::new().value("b", DataType::Numeric),
//! )
//! .with_numeric_type(Arc::clone(&numeric));
//! let root = binder.root();
//! binder.define_input_cell(root, "A1", "a").unwrap();
//! binder.define_output_cell(root, "B1", "b").unwrap();
//!
//! let mut model = binder.bind().unwrap();
//! ModelTransformer::new(numeric.as_ref(), &config).transform(&mut model).unwrap();
//!
//! let engine = Engine::new(model, numeric);
//! let inputs = Record::new().with("a", 21.0);
//! assert_eq!(engine.computation(&inputs).get("b").unwrap(), Value::from(42.0));
//! ```

pub mod analysis;
pub mod binder;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod model;
pub mod numeric;
pub mod optimizer;
pub mod rewriting;
pub mod shape;
pub mod transformer;
pub mod value;

pub use analysis::TypeAnnotator;
pub use binder::{SectionKey, SpreadsheetBinder};
pub use config::{CompilerConfig, ComputationOptions};
pub use engine::{Computation, Engine, Inputs, Record, SectionRow};
pub use error::{CompilerError, CompilerResult, EvalError, EvalResult};
pub use model::{
    CellId, CellModel, ComputationModel, ExprArena, ExprId, ExprNode, Operator, Orientation,
    SectionId, SectionModel,
};
pub use numeric::{
    BigDecimalType, DoubleType, Number, NumericError, NumericType, NumericTypeSpec, RoundingMode,
    ScaledLongType,
};
pub use rewriting::ModelRewriter;
pub use shape::{SectionSlot, Shape, ValueSlot};
pub use transformer::ModelTransformer;
pub use value::{DataType, Value};
