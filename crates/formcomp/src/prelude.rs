//! Prelude module - common imports for formcomp users
//!
//! ```rust
//! use formcomp::prelude::*;
//! ```

pub use crate::{
    // Cell table
    CellValue,
    // Compilation
    CompilerConfig,
    CompilerError,
    Computation,
    ComputationOptions,
    DataType,
    Engine,
    EngineBuilder,
    EvalError,
    Inputs,
    LoaderRegistry,
    NumericTypeSpec,
    Orientation,
    Record,
    RoundingMode,
    Shape,
    Spreadsheet,
    Value,
};
