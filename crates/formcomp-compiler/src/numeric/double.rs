use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{
    decimal_from_f64, round_decimal, NumericError, NumericResult, NumericType, Number,
    RoundingMode,
};

/// Binary floating point
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleType;

impl DoubleType {
    fn checked(value: f64) -> NumericResult<Number> {
        if value.is_nan() {
            Err(NumericError::Domain("result"))
        } else if value.is_infinite() {
            Err(NumericError::Overflow)
        } else {
            Ok(Number::Double(value))
        }
    }
}

impl NumericType for DoubleType {
    fn name(&self) -> String {
        "double".to_string()
    }

    fn scale(&self) -> Option<u32> {
        None
    }

    fn rounding_mode(&self) -> RoundingMode {
        RoundingMode::HalfEven
    }

    fn zero(&self) -> Number {
        Number::Double(0.0)
    }

    fn one(&self) -> Number {
        Number::Double(1.0)
    }

    fn min_value(&self) -> Number {
        Number::Double(f64::MIN)
    }

    fn max_value(&self) -> Number {
        Number::Double(f64::MAX)
    }

    fn from_f64(&self, value: f64) -> NumericResult<Number> {
        Ok(Number::Double(value))
    }

    fn from_decimal(&self, value: Decimal) -> NumericResult<Number> {
        value.to_f64().map(Number::Double).ok_or(NumericError::Overflow)
    }

    fn from_i64(&self, value: i64) -> NumericResult<Number> {
        Ok(Number::Double(value as f64))
    }

    fn adjust_constant(&self, value: Number) -> Number {
        value
    }

    fn parse(&self, text: &str) -> NumericResult<Number> {
        text.trim()
            .parse::<f64>()
            .map(Number::Double)
            .map_err(|_| NumericError::InvalidNumber(text.to_string()))
    }

    fn compare(&self, a: &Number, b: &Number) -> Ordering {
        a.to_f64().total_cmp(&b.to_f64())
    }

    fn is_finite(&self, value: &Number) -> bool {
        value.to_f64().is_finite()
    }

    fn add(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        Self::checked(a.to_f64() + b.to_f64())
    }

    fn sub(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        Self::checked(a.to_f64() - b.to_f64())
    }

    fn mul(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        Self::checked(a.to_f64() * b.to_f64())
    }

    fn div(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        let divisor = b.to_f64();
        if divisor == 0.0 {
            return Err(NumericError::DivisionByZero);
        }
        Self::checked(a.to_f64() / divisor)
    }

    fn neg(&self, a: &Number) -> NumericResult<Number> {
        Ok(Number::Double(-a.to_f64()))
    }

    fn pow(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        Self::checked(a.to_f64().powf(b.to_f64()))
    }

    // Rounds the shortest decimal text of the value, so ROUND(2.675, 2) is 2.68
    fn round(&self, a: &Number, digits: i32, mode: RoundingMode) -> NumericResult<Number> {
        let rounded = round_decimal(decimal_from_f64(a.to_f64())?, digits, mode)?;
        self.from_decimal(rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let t = DoubleType;
        let a = Number::Double(1.5);
        let b = Number::Double(0.5);
        assert_eq!(t.add(&a, &b).unwrap(), Number::Double(2.0));
        assert_eq!(t.div(&a, &b).unwrap(), Number::Double(3.0));
        assert_eq!(t.div(&a, &t.zero()), Err(NumericError::DivisionByZero));
        assert_eq!(t.pow(&Number::Double(-1.0), &b), Err(NumericError::Domain("result")));
    }

    #[test]
    fn test_round_uses_decimal_digits() {
        let t = DoubleType;
        let value = Number::Double(2.675);
        assert_eq!(
            t.round(&value, 2, RoundingMode::HalfUp).unwrap(),
            Number::Double(2.68)
        );
        assert_eq!(
            t.round(&value, 1, RoundingMode::Down).unwrap(),
            Number::Double(2.6)
        );
    }

    #[test]
    fn test_format() {
        let t = DoubleType;
        assert_eq!(t.format(&Number::Double(3.0)), "3");
        assert_eq!(t.format(&Number::Double(0.1)), "0.1");
        assert_eq!(t.format(&t.parse("1.50").unwrap()), "1.5");
    }
}
