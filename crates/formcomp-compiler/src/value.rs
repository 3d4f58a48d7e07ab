//! Runtime values and their static types

use std::fmt;

use crate::numeric::{Number, NumericResult, NumericType};

/// Static type of an expression or cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Null,
    Numeric,
    String,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Null => "null",
            DataType::Numeric => "numeric",
            DataType::String => "string",
        })
    }
}

/// A value flowing through a computation
///
/// Booleans are represented as the numbers 1 and 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Null,
    Number(Number),
    Text(String),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Number(_) => DataType::Numeric,
            Value::Text(_) => DataType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lossy numeric view, convenient in tests and diagnostics
    pub fn to_f64(&self) -> Option<f64> {
        self.as_number().map(Number::to_f64)
    }

    /// Render with the numeric type's canonical formatting
    pub fn format(&self, numeric: &dyn NumericType) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => numeric.format(n),
            Value::Text(s) => s.clone(),
        }
    }

    /// Convert to `target`; Null becomes zero or the empty string
    pub fn coerce(self, target: DataType, numeric: &dyn NumericType) -> NumericResult<Value> {
        Ok(match (self, target) {
            (value, DataType::Null) => value,
            (Value::Null, DataType::Numeric) => Value::Number(numeric.zero()),
            (Value::Number(n), DataType::Numeric) => Value::Number(numeric.convert(&n)?),
            (Value::Text(s), DataType::Numeric) => Value::Number(numeric.parse(&s)?),
            (Value::Null, DataType::String) => Value::Text(String::new()),
            (Value::Number(n), DataType::String) => Value::Text(numeric.format(&n)),
            (Value::Text(s), DataType::String) => Value::Text(s),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(Number::Double(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(Number::Double(f64::from(value)))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Number(Number::Double(if value { 1.0 } else { 0.0 }))
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}
