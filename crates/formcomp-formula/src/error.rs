//! Formula parse error types

use std::fmt;

use thiserror::Error;

/// Result type for formula parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// What went wrong while parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Malformed formula text
    #[error("{0}")]
    Syntax(String),

    /// Well-formed text the compiler cannot handle (unknown function, bad argument count)
    #[error("{0}")]
    Unsupported(String),

    /// A reference that does not denote a cell on the sheet
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

/// A formula parse failure with its column
///
/// Displays the message, the formula text, and a caret under the offending character:
///
/// ```text
/// Unsupported function OFFSET in formula
///   =1+OFFSET(A1)
///      ^
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub formula: String,
    /// Zero-based character column in `formula`
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(formula: impl Into<String>, column: usize, kind: ParseErrorKind) -> Self {
        Self {
            formula: formula.into(),
            column,
            kind,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind, ParseErrorKind::Unsupported(_))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} in formula", self.kind)?;
        writeln!(f, "  {}", self.formula)?;
        write!(f, "  {}^", " ".repeat(self.column))
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_points_at_column() {
        let err = ParseError::new(
            "=1+FOO(2)",
            3,
            ParseErrorKind::Unsupported("Unsupported function FOO".into()),
        );
        assert_eq!(
            err.to_string(),
            "Unsupported function FOO in formula\n  =1+FOO(2)\n     ^"
        );
        assert!(err.is_unsupported());
    }
}
