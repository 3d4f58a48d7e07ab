use std::cmp::Ordering;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

use super::{
    decimal_from_f64, parse_decimal, round_decimal, NumericError, NumericResult, NumericType,
    Number, RoundingMode,
};

/// Largest scale a `Decimal` can hold
const MAX_SCALE: u32 = 28;

/// Decimal arithmetic with 28 significant digits
///
/// With a scale, every constant and every arithmetic result is rounded to `scale` fractional
/// digits using the rounding mode. Without one the full 28 significant digits are kept.
#[derive(Debug, Clone, Copy)]
pub struct BigDecimalType {
    scale: Option<u32>,
    rounding: RoundingMode,
}

impl BigDecimalType {
    pub fn new(scale: Option<u32>, rounding: RoundingMode) -> NumericResult<Self> {
        if let Some(scale) = scale {
            if scale > MAX_SCALE {
                return Err(NumericError::InvalidConfiguration(format!(
                    "decimal scale {} exceeds {}",
                    scale, MAX_SCALE
                )));
            }
        }
        Ok(Self { scale, rounding })
    }

    fn adjust(&self, value: Decimal) -> Decimal {
        match self.scale {
            Some(scale) => value.round_dp_with_strategy(scale, self.rounding.strategy()),
            None => value,
        }
    }

    fn value(&self, value: &Number) -> NumericResult<Decimal> {
        value.to_decimal()
    }

    fn result(&self, value: Option<Decimal>) -> NumericResult<Number> {
        value
            .map(|v| Number::Decimal(self.adjust(v)))
            .ok_or(NumericError::Overflow)
    }
}

impl NumericType for BigDecimalType {
    fn name(&self) -> String {
        match self.scale {
            Some(scale) => format!("decimal({}, {})", scale, self.rounding),
            None => "decimal".to_string(),
        }
    }

    fn scale(&self) -> Option<u32> {
        self.scale
    }

    fn rounding_mode(&self) -> RoundingMode {
        self.rounding
    }

    fn zero(&self) -> Number {
        Number::Decimal(Decimal::ZERO)
    }

    fn one(&self) -> Number {
        Number::Decimal(Decimal::ONE)
    }

    fn min_value(&self) -> Number {
        Number::Decimal(Decimal::MIN)
    }

    fn max_value(&self) -> Number {
        Number::Decimal(Decimal::MAX)
    }

    fn from_f64(&self, value: f64) -> NumericResult<Number> {
        Ok(Number::Decimal(self.adjust(decimal_from_f64(value)?)))
    }

    fn from_decimal(&self, value: Decimal) -> NumericResult<Number> {
        Ok(Number::Decimal(self.adjust(value)))
    }

    fn adjust_constant(&self, value: Number) -> Number {
        match value {
            Number::Decimal(v) => Number::Decimal(self.adjust(v)),
            other => self.convert(&other).unwrap_or(other),
        }
    }

    fn parse(&self, text: &str) -> NumericResult<Number> {
        Ok(Number::Decimal(self.adjust(parse_decimal(text)?)))
    }

    fn compare(&self, a: &Number, b: &Number) -> Ordering {
        match (a.to_decimal(), b.to_decimal()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.to_f64().total_cmp(&b.to_f64()),
        }
    }

    fn add(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        self.result(self.value(a)?.checked_add(self.value(b)?))
    }

    fn sub(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        self.result(self.value(a)?.checked_sub(self.value(b)?))
    }

    fn mul(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        self.result(self.value(a)?.checked_mul(self.value(b)?))
    }

    fn div(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        let divisor = self.value(b)?;
        if divisor.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        self.result(self.value(a)?.checked_div(divisor))
    }

    fn neg(&self, a: &Number) -> NumericResult<Number> {
        Ok(Number::Decimal(-self.value(a)?))
    }

    fn pow(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        let base = self.value(a)?;
        let exponent = self.value(b)?;
        if exponent.fract().is_zero() {
            let exponent = exponent.to_i64().ok_or(NumericError::Overflow)?;
            if exponent < 0 && base.is_zero() {
                return Err(NumericError::DivisionByZero);
            }
            return self.result(base.checked_powi(exponent));
        }
        let result = base.to_f64().unwrap_or(f64::NAN).powf(exponent.to_f64().unwrap_or(f64::NAN));
        if !result.is_finite() {
            return Err(NumericError::Domain("POWER"));
        }
        self.result(Decimal::from_f64(result))
    }

    fn round(&self, a: &Number, digits: i32, mode: RoundingMode) -> NumericResult<Number> {
        Ok(Number::Decimal(self.adjust(round_decimal(self.value(a)?, digits, mode)?)))
    }
}
