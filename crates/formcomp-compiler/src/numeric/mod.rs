//! Numeric type abstraction
//!
//! Every compilation picks exactly one [`NumericType`]. The rewriter asks it for neutral
//! elements, constant folding and the engine use it for arithmetic, and input and output
//! conversion goes through its `parse`/`format`.
//!
//! Three implementations are provided:
//! - [`DoubleType`] - plain `f64`
//! - [`BigDecimalType`] - `rust_decimal::Decimal`, optionally rounded to a fixed scale
//! - [`ScaledLongType`] - `i64` holding `value * 10^scale`

mod decimal;
mod double;
mod scaled_long;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use thiserror::Error;

pub use decimal::BigDecimalType;
pub use double::DoubleType;
pub use scaled_long::ScaledLongType;

/// Result type for numeric operations
pub type NumericResult<T> = std::result::Result<T, NumericError>;

/// Arithmetic and conversion failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow")]
    Overflow,

    #[error("Not a number: '{0}'")]
    InvalidNumber(String),

    #[error("{0} is not defined for this argument")]
    Domain(&'static str),

    #[error("Invalid numeric type: {0}")]
    InvalidConfiguration(String),
}

/// A number in the representation of one of the numeric types
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Double(f64),
    Decimal(Decimal),
    /// `units / 10^scale`
    Scaled { units: i64, scale: u32 },
}

impl Number {
    /// Lossy conversion used for transcendental functions and diagnostics
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Double(value) => *value,
            Number::Decimal(value) => value.to_f64().unwrap_or(f64::NAN),
            Number::Scaled { units, scale } => {
                scaled_to_decimal(*units, *scale).to_f64().unwrap_or(f64::NAN)
            }
        }
    }

    /// Exact decimal value, if the number has one
    pub fn to_decimal(&self) -> NumericResult<Decimal> {
        match self {
            Number::Double(value) => decimal_from_f64(*value),
            Number::Decimal(value) => Ok(*value),
            Number::Scaled { units, scale } => Ok(scaled_to_decimal(*units, *scale)),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Double(value) => *value == 0.0,
            Number::Decimal(value) => value.is_zero(),
            Number::Scaled { units, .. } => *units == 0,
        }
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Double(a), Number::Double(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Number::Decimal(a), Number::Decimal(b)) => a == b,
            (
                Number::Scaled { units: a, scale: sa },
                Number::Scaled { units: b, scale: sb },
            ) => a == b && sa == sb,
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Number::Double(value) => canonical_bits(*value).hash(state),
            Number::Decimal(value) => value.hash(state),
            Number::Scaled { units, scale } => {
                units.hash(state);
                scale.hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Double(value) => f.write_str(&format_double(*value)),
            Number::Decimal(value) => f.write_str(&format_decimal(*value)),
            Number::Scaled { units, scale } => {
                f.write_str(&format_decimal(scaled_to_decimal(*units, *scale)))
            }
        }
    }
}

/// Rounding applied by scaled decimal types and the ROUND family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundingMode {
    /// Away from zero
    Up,
    /// Toward zero
    Down,
    Ceiling,
    Floor,
    #[default]
    HalfUp,
    HalfDown,
    HalfEven,
}

impl RoundingMode {
    pub fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
            RoundingMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
            RoundingMode::Floor => RoundingStrategy::ToNegativeInfinity,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfDown => RoundingStrategy::MidpointTowardZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoundingMode::Up => "up",
            RoundingMode::Down => "down",
            RoundingMode::Ceiling => "ceiling",
            RoundingMode::Floor => "floor",
            RoundingMode::HalfUp => "half-up",
            RoundingMode::HalfDown => "half-down",
            RoundingMode::HalfEven => "half-even",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoundingMode {
    type Err = NumericError;

    fn from_str(s: &str) -> NumericResult<Self> {
        let mode = match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "up" => RoundingMode::Up,
            "down" => RoundingMode::Down,
            "ceiling" => RoundingMode::Ceiling,
            "floor" => RoundingMode::Floor,
            "half-up" => RoundingMode::HalfUp,
            "half-down" => RoundingMode::HalfDown,
            "half-even" => RoundingMode::HalfEven,
            other => {
                return Err(NumericError::InvalidConfiguration(format!(
                    "unknown rounding mode '{}'",
                    other
                )))
            }
        };
        Ok(mode)
    }
}

/// Arithmetic and conversions of one number representation
///
/// Implementations are immutable and shared as `Arc<dyn NumericType>` for the lifetime of a
/// compiled engine. Every operation accepts numbers in any representation and returns its own.
pub trait NumericType: fmt::Debug + Send + Sync {
    /// Short description, e.g. `decimal(4, half-up)`
    fn name(&self) -> String;

    /// Number of fractional digits kept, `None` when unscaled
    fn scale(&self) -> Option<u32>;

    fn rounding_mode(&self) -> RoundingMode;

    fn zero(&self) -> Number;
    fn one(&self) -> Number;

    /// Smallest representable value, the neutral element of MAX
    fn min_value(&self) -> Number;

    /// Largest representable value, the neutral element of MIN
    fn max_value(&self) -> Number;

    fn from_f64(&self, value: f64) -> NumericResult<Number>;
    fn from_decimal(&self, value: Decimal) -> NumericResult<Number>;

    fn from_i64(&self, value: i64) -> NumericResult<Number> {
        self.from_decimal(Decimal::from(value))
    }

    /// Bring a number of any representation into this one
    fn convert(&self, value: &Number) -> NumericResult<Number> {
        match value {
            Number::Double(v) => self.from_f64(*v),
            Number::Decimal(v) => self.from_decimal(*v),
            Number::Scaled { units, scale } => self.from_decimal(scaled_to_decimal(*units, *scale)),
        }
    }

    fn to_f64(&self, value: &Number) -> f64 {
        value.to_f64()
    }

    /// Round a constant to the type's scale; must be idempotent
    fn adjust_constant(&self, value: Number) -> Number;

    fn parse(&self, text: &str) -> NumericResult<Number>;

    /// Canonical text, without trailing fractional zeros
    fn format(&self, value: &Number) -> String {
        value.to_string()
    }

    fn compare(&self, a: &Number, b: &Number) -> Ordering;

    fn is_finite(&self, _value: &Number) -> bool {
        true
    }

    fn add(&self, a: &Number, b: &Number) -> NumericResult<Number>;
    fn sub(&self, a: &Number, b: &Number) -> NumericResult<Number>;
    fn mul(&self, a: &Number, b: &Number) -> NumericResult<Number>;
    fn div(&self, a: &Number, b: &Number) -> NumericResult<Number>;
    fn neg(&self, a: &Number) -> NumericResult<Number>;
    fn pow(&self, a: &Number, b: &Number) -> NumericResult<Number>;

    /// Round to `digits` fractional digits (negative digits round to tens, hundreds, ...)
    fn round(&self, a: &Number, digits: i32, mode: RoundingMode) -> NumericResult<Number>;
}

/// Which numeric type to compile for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericTypeSpec {
    #[default]
    Double,
    BigDecimal {
        scale: Option<u32>,
        rounding: RoundingMode,
    },
    ScaledLong {
        scale: u32,
    },
}

impl NumericTypeSpec {
    pub fn decimal(scale: u32, rounding: RoundingMode) -> Self {
        NumericTypeSpec::BigDecimal {
            scale: Some(scale),
            rounding,
        }
    }

    pub fn scaled(scale: u32) -> Self {
        NumericTypeSpec::ScaledLong { scale }
    }

    /// Instantiate the numeric type, validating its scale
    pub fn build(&self) -> NumericResult<Arc<dyn NumericType>> {
        Ok(match *self {
            NumericTypeSpec::Double => Arc::new(DoubleType),
            NumericTypeSpec::BigDecimal { scale, rounding } => {
                Arc::new(BigDecimalType::new(scale, rounding)?)
            }
            NumericTypeSpec::ScaledLong { scale } => Arc::new(ScaledLongType::new(scale)?),
        })
    }
}

impl fmt::Display for NumericTypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericTypeSpec::Double => f.write_str("double"),
            NumericTypeSpec::BigDecimal { scale: None, .. } => f.write_str("decimal"),
            NumericTypeSpec::BigDecimal {
                scale: Some(scale),
                rounding,
            } => write!(f, "decimal:{}:{}", scale, rounding),
            NumericTypeSpec::ScaledLong { scale } => write!(f, "scaled:{}", scale),
        }
    }
}

/// Accepts `double`, `decimal`, `decimal:4`, `decimal:4:half-even` and `scaled:4`
impl FromStr for NumericTypeSpec {
    type Err = NumericError;

    fn from_str(s: &str) -> NumericResult<Self> {
        let mut parts = s.trim().split(':');
        let kind = parts.next().unwrap_or_default().to_ascii_lowercase();
        let scale = parts
            .next()
            .map(|text| {
                text.parse::<u32>().map_err(|_| {
                    NumericError::InvalidConfiguration(format!("invalid scale '{}'", text))
                })
            })
            .transpose()?;
        let rounding = parts.next().map(RoundingMode::from_str).transpose()?;
        if parts.next().is_some() {
            return Err(NumericError::InvalidConfiguration(s.to_string()));
        }

        match (kind.as_str(), scale, rounding) {
            ("double", None, None) => Ok(NumericTypeSpec::Double),
            ("decimal" | "bigdecimal", scale, rounding) => Ok(NumericTypeSpec::BigDecimal {
                scale,
                rounding: rounding.unwrap_or_default(),
            }),
            ("scaled" | "long", Some(scale), None) => Ok(NumericTypeSpec::ScaledLong { scale }),
            ("scaled" | "long", None, None) => Ok(NumericTypeSpec::ScaledLong { scale: 0 }),
            _ => Err(NumericError::InvalidConfiguration(s.to_string())),
        }
    }
}

// === Shared helpers ===

pub(crate) fn scaled_to_decimal(units: i64, scale: u32) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, scale)
}

/// Exact shortest-text conversion, falling back to the binary value for extreme magnitudes
pub(crate) fn decimal_from_f64(value: f64) -> NumericResult<Decimal> {
    if !value.is_finite() {
        return Err(NumericError::Overflow);
    }
    Decimal::from_str(&value.to_string())
        .or_else(|_| Decimal::from_f64(value).ok_or(NumericError::Overflow))
}

pub(crate) fn parse_decimal(text: &str) -> NumericResult<Decimal> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| NumericError::InvalidNumber(text.to_string()))
}

/// Round to `digits` places; negative digits round left of the decimal point
pub(crate) fn round_decimal(
    value: Decimal,
    digits: i32,
    mode: RoundingMode,
) -> NumericResult<Decimal> {
    if digits >= 0 {
        return Ok(value.round_dp_with_strategy(digits.min(28) as u32, mode.strategy()));
    }
    let factor = Decimal::TEN
        .checked_powi(i64::from(-digits))
        .ok_or(NumericError::Overflow)?;
    let shifted = value.checked_div(factor).ok_or(NumericError::Overflow)?;
    shifted
        .round_dp_with_strategy(0, mode.strategy())
        .checked_mul(factor)
        .ok_or(NumericError::Overflow)
}

pub(crate) fn format_decimal(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    value.normalize().to_string()
}

pub(crate) fn format_double(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
