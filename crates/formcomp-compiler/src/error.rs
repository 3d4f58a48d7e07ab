//! Compiler and evaluation error types

use formcomp_formula::ParseError;
use thiserror::Error;

use crate::numeric::NumericError;

/// Result type for compilation
pub type CompilerResult<T> = std::result::Result<T, CompilerError>;

/// Result type for evaluating a compiled computation
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors raised while binding and transforming a computation model
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Spreadsheet(#[from] formcomp_core::Error),

    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error("Unknown name or reference '{0}'")]
    UnknownName(String),

    #[error("Cell {cell} is already bound as {binding}")]
    DuplicateBinding { cell: String, binding: String },

    #[error("Slot '{slot}' is already bound to {cell}")]
    DuplicateSlot { slot: String, cell: String },

    #[error("Input cell {0} must not contain a formula")]
    InputHasFormula(String),

    #[error("No {side} slot named '{slot}'")]
    UnknownSlot { slot: String, side: &'static str },

    #[error("Invalid repeating section {range}: {reason}")]
    SectionShape { range: String, reason: String },

    #[error("Invalid reference to {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Unsupported expression {expr}: {reason}")]
    UnsupportedExpression { expr: String, reason: String },

    #[error("Circular reference involving cell {0}")]
    CyclicReference(String),

    #[error("Internal compiler error: {0}")]
    Internal(String),

    #[error("{source} (in cell {cell})")]
    InCell {
        cell: String,
        source: Box<CompilerError>,
    },
}

impl CompilerError {
    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::Internal(message.into())
    }

    pub fn unsupported(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        CompilerError::UnsupportedExpression {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    /// Attach the cell being processed, unless a cell is already attached
    pub fn in_cell(self, cell: impl Into<String>) -> Self {
        match self {
            CompilerError::InCell { .. } | CompilerError::CyclicReference(_) => self,
            other => CompilerError::InCell {
                cell: cell.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error without any cell context
    pub fn root_cause(&self) -> &CompilerError {
        match self {
            CompilerError::InCell { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors raised while evaluating a compiled computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error("No value supplied for input '{0}'")]
    MissingInput(String),

    #[error("No output named '{0}'")]
    UnknownOutput(String),

    #[error("No section named '{0}'")]
    UnknownSection(String),

    #[error("Value error: {0}")]
    Value(String),

    #[error("Reference out of range: {0}")]
    Reference(String),

    /// A lookup found nothing
    #[error("Value not available: {0}")]
    NotAvailable(String),

    #[error("Internal evaluation error: {0}")]
    Internal(String),

    #[error("{source} (in cell {cell})")]
    InCell {
        cell: String,
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub fn in_cell(self, cell: impl Into<String>) -> Self {
        match self {
            EvalError::InCell { .. } => self,
            other => EvalError::InCell {
                cell: cell.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error without any cell context
    pub fn root_cause(&self) -> &EvalError {
        match self {
            EvalError::InCell { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
