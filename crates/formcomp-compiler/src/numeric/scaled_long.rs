use std::cmp::Ordering;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::{
    decimal_from_f64, parse_decimal, round_decimal, NumericError, NumericResult, NumericType,
    Number, RoundingMode,
};

const MAX_SCALE: u32 = 18;

/// Fixed-point arithmetic on `i64` units of `10^-scale`
///
/// Products and quotients are computed in `i128` and truncated toward zero. Scale 0 is plain
/// long arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct ScaledLongType {
    scale: u32,
    factor: i64,
}

impl ScaledLongType {
    pub fn new(scale: u32) -> NumericResult<Self> {
        if scale > MAX_SCALE {
            return Err(NumericError::InvalidConfiguration(format!(
                "scaled long scale {} exceeds {}",
                scale, MAX_SCALE
            )));
        }
        Ok(Self {
            scale,
            factor: 10i64.pow(scale),
        })
    }

    fn number(&self, units: i64) -> Number {
        Number::Scaled {
            units,
            scale: self.scale,
        }
    }

    fn narrow(&self, units: i128) -> NumericResult<Number> {
        i64::try_from(units)
            .map(|units| self.number(units))
            .map_err(|_| NumericError::Overflow)
    }

    fn rescale(&self, value: Decimal, strategy: RoundingStrategy) -> NumericResult<Number> {
        let rounded = value.round_dp_with_strategy(self.scale, strategy);
        let units = rounded
            .checked_mul(Decimal::from(self.factor))
            .ok_or(NumericError::Overflow)?;
        units
            .trunc()
            .to_i64()
            .map(|units| self.number(units))
            .ok_or(NumericError::Overflow)
    }

    /// Exponentiation by squaring, truncating after every product
    fn powi(&self, base: i64, mut exponent: u64) -> NumericResult<Number> {
        let factor = i128::from(self.factor);
        let within = |units: i128| {
            i64::try_from(units)
                .map(i128::from)
                .map_err(|_| NumericError::Overflow)
        };

        let mut result = factor;
        let mut base = i128::from(base);
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = within(result * base / factor)?;
            }
            exponent >>= 1;
            if exponent > 0 {
                base = within(base * base / factor)?;
            }
        }
        self.narrow(result)
    }

    fn units(&self, value: &Number) -> NumericResult<i64> {
        match value {
            Number::Scaled { units, scale } if *scale == self.scale => Ok(*units),
            other => match self.rescale(other.to_decimal()?, RoundingStrategy::ToZero)? {
                Number::Scaled { units, .. } => Ok(units),
                _ => Err(NumericError::Overflow),
            },
        }
    }
}

impl NumericType for ScaledLongType {
    fn name(&self) -> String {
        format!("scaled({})", self.scale)
    }

    fn scale(&self) -> Option<u32> {
        Some(self.scale)
    }

    fn rounding_mode(&self) -> RoundingMode {
        RoundingMode::Down
    }

    fn zero(&self) -> Number {
        self.number(0)
    }

    fn one(&self) -> Number {
        self.number(self.factor)
    }

    fn min_value(&self) -> Number {
        self.number(i64::MIN)
    }

    fn max_value(&self) -> Number {
        self.number(i64::MAX)
    }

    fn from_f64(&self, value: f64) -> NumericResult<Number> {
        self.rescale(decimal_from_f64(value)?, RoundingStrategy::MidpointAwayFromZero)
    }

    fn from_decimal(&self, value: Decimal) -> NumericResult<Number> {
        self.rescale(value, RoundingStrategy::MidpointAwayFromZero)
    }

    fn from_i64(&self, value: i64) -> NumericResult<Number> {
        value
            .checked_mul(self.factor)
            .map(|units| self.number(units))
            .ok_or(NumericError::Overflow)
    }

    fn adjust_constant(&self, value: Number) -> Number {
        match value {
            Number::Scaled { scale, .. } if scale == self.scale => value,
            other => self.convert(&other).unwrap_or(other),
        }
    }

    fn parse(&self, text: &str) -> NumericResult<Number> {
        self.rescale(parse_decimal(text)?, RoundingStrategy::MidpointAwayFromZero)
    }

    fn compare(&self, a: &Number, b: &Number) -> Ordering {
        match (self.units(a), self.units(b)) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.to_f64().total_cmp(&b.to_f64()),
        }
    }

    fn add(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        self.units(a)?
            .checked_add(self.units(b)?)
            .map(|units| self.number(units))
            .ok_or(NumericError::Overflow)
    }

    fn sub(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        self.units(a)?
            .checked_sub(self.units(b)?)
            .map(|units| self.number(units))
            .ok_or(NumericError::Overflow)
    }

    fn mul(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        let product = i128::from(self.units(a)?) * i128::from(self.units(b)?);
        self.narrow(product / i128::from(self.factor))
    }

    fn div(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        let divisor = self.units(b)?;
        if divisor == 0 {
            return Err(NumericError::DivisionByZero);
        }
        let dividend = i128::from(self.units(a)?) * i128::from(self.factor);
        self.narrow(dividend / i128::from(divisor))
    }

    fn neg(&self, a: &Number) -> NumericResult<Number> {
        self.units(a)?
            .checked_neg()
            .map(|units| self.number(units))
            .ok_or(NumericError::Overflow)
    }

    fn pow(&self, a: &Number, b: &Number) -> NumericResult<Number> {
        let exponent = b.to_decimal()?;
        if exponent.fract().is_zero() && exponent >= Decimal::ZERO {
            if let Some(exponent) = exponent.to_u64() {
                return self.powi(self.units(a)?, exponent);
            }
        }
        let result = a.to_f64().powf(b.to_f64());
        if !result.is_finite() {
            return Err(NumericError::Domain("POWER"));
        }
        let value = Decimal::from_f64(result).ok_or(NumericError::Overflow)?;
        self.rescale(value, RoundingStrategy::ToZero)
    }

    fn round(&self, a: &Number, digits: i32, mode: RoundingMode) -> NumericResult<Number> {
        let rounded = round_decimal(a.to_decimal()?, digits, mode)?;
        self.rescale(rounded, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_rounds_half_up() {
        let t = ScaledLongType::new(2).unwrap();
        assert_eq!(t.parse("1.005").unwrap(), Number::Scaled { units: 101, scale: 2 });
        assert_eq!(t.parse("-1.005").unwrap(), Number::Scaled { units: -101, scale: 2 });
        assert_eq!(t.format(&t.parse("3.10").unwrap()), "3.1");
    }

    #[test]
    fn test_products_truncate() {
        let t = ScaledLongType::new(2).unwrap();
        let a = t.parse("1.15").unwrap();
        let b = t.parse("0.5").unwrap();
        // 0.575 truncates to 0.57
        assert_eq!(t.format(&t.mul(&a, &b).unwrap()), "0.57");
        assert_eq!(t.format(&t.div(&t.one(), &t.parse("3").unwrap()).unwrap()), "0.33");
        assert_eq!(
            t.format(&t.div(&t.neg(&t.one()).unwrap(), &t.parse("3").unwrap()).unwrap()),
            "-0.33"
        );
    }

    #[test]
    fn test_overflow_and_division_by_zero() {
        let t = ScaledLongType::new(4).unwrap();
        assert_eq!(t.add(&t.max_value(), &t.one()), Err(NumericError::Overflow));
        assert_eq!(t.div(&t.one(), &t.zero()), Err(NumericError::DivisionByZero));
    }

    #[test]
    fn test_scale_zero_is_plain_long() {
        let t = ScaledLongType::new(0).unwrap();
        let seven = t.from_i64(7).unwrap();
        let two = t.from_i64(2).unwrap();
        assert_eq!(t.format(&t.div(&seven, &two).unwrap()), "3");
        assert_eq!(t.format(&t.pow(&two, &t.from_i64(10).unwrap()).unwrap()), "1024");
    }

    #[test]
    fn test_pow_by_squaring() {
        let t = ScaledLongType::new(0).unwrap();
        let two = t.from_i64(2).unwrap();
        assert_eq!(
            t.format(&t.pow(&two, &t.from_i64(62).unwrap()).unwrap()),
            "4611686018427387904"
        );
        assert_eq!(t.pow(&two, &t.from_i64(63).unwrap()), Err(NumericError::Overflow));
        assert_eq!(
            t.format(&t.pow(&t.from_i64(-2).unwrap(), &t.from_i64(3).unwrap()).unwrap()),
            "-8"
        );

        let t = ScaledLongType::new(4).unwrap();
        let huge = t.from_i64(4_000_000_000).unwrap();
        assert_eq!(t.pow(&t.one(), &huge).unwrap(), t.one());
        assert_eq!(t.pow(&t.parse("0.5").unwrap(), &huge).unwrap(), t.zero());
        assert_eq!(t.pow(&t.parse("1.1").unwrap(), &huge), Err(NumericError::Overflow));
        let two = t.from_i64(2).unwrap();
        assert_eq!(t.format(&t.pow(&t.parse("1.5").unwrap(), &two).unwrap()), "2.25");
        assert_eq!(t.pow(&t.parse("7.25").unwrap(), &t.zero()).unwrap(), t.one());
    }
}
