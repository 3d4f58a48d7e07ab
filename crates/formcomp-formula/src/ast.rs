//! Formula Abstract Syntax Tree types

use std::fmt;

use formcomp_core::{CellAddress, CellRange};

use crate::functions::{Aggregator, Function};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal, kept as written so the compiler can read it at full precision
    Number(String),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Defined name
    NameRef(String),

    // === Operators ===
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Calls ===
    Function {
        function: Function,
        args: Vec<FormulaExpr>,
    },
    Aggregate {
        aggregator: Aggregator,
        args: Vec<FormulaExpr>,
    },
}

/// Cell reference with optional sheet
///
/// R1C1 references are resolved against the formula's cell while parsing, so the address is
/// always an absolute position.
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Percent,
}

impl FormulaExpr {
    /// Visit every node, parents before children
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FormulaExpr)) {
        visit(self);
        match self {
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.walk(visit),
            FormulaExpr::Function { args, .. } | FormulaExpr::Aggregate { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            _ => {}
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[FormulaExpr]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_str(")")
}

fn write_sheet(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    match sheet {
        Some(name) if name.contains(' ') => write!(f, "'{}'!", name),
        Some(name) => write!(f, "{}!", name),
        None => Ok(()),
    }
}

/// Renders the expression in A1 notation; nested binary operations are parenthesized
impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(text) => f.write_str(text),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::CellRef(r) => {
                write_sheet(f, &r.sheet)?;
                write!(f, "{}", r.address)
            }
            FormulaExpr::RangeRef(r) => {
                write_sheet(f, &r.sheet)?;
                write!(f, "{}", r.range)
            }
            FormulaExpr::NameRef(name) => f.write_str(name),
            FormulaExpr::BinaryOp { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => write!(f, "-{}", operand),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand,
            } => write!(f, "{}%", operand),
            FormulaExpr::Function { function, args } => write_args(f, function.name(), args),
            FormulaExpr::Aggregate { aggregator, args } => {
                write_args(f, aggregator.name(), args)
            }
        }
    }
}
