//! Scalar functions

use std::cmp::Ordering;

use chrono::Local;
use formcomp_formula::Function;
use rust_decimal::MathematicalOps;

use super::interpreter::{Env, Host, Interpreter};
use crate::error::{EvalError, EvalResult};
use crate::model::{ExprId, ExprNode};
use crate::numeric::{Number, NumericError, RoundingMode};
use crate::value::Value;

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

fn take_mid(s: &str, start_1based: usize, n: usize) -> String {
    if start_1based == 0 {
        return String::new();
    }
    s.chars().skip(start_1based - 1).take(n).collect()
}

/// Evaluate a call; IF, AND and OR only evaluate the arguments they need
pub(crate) fn call<H: Host>(
    interp: &Interpreter<'_>,
    host: &H,
    function: Function,
    args: &[ExprId],
    env: &mut Env,
) -> EvalResult<Value> {
    let numeric = interp.numeric();
    match function {
        Function::If => {
            let condition = interp.eval(host, arg(args, 0)?, env)?;
            if interp.truth(&condition)? {
                interp.eval(host, arg(args, 1)?, env)
            } else {
                match args.get(2) {
                    Some(otherwise) => interp.eval(host, *otherwise, env),
                    None => Ok(interp.boolean(false)),
                }
            }
        }
        Function::And | Function::Or => {
            let wanted = function == Function::Or;
            for id in args {
                let value = interp.eval(host, *id, env)?;
                if interp.truth(&value)? == wanted {
                    return Ok(interp.boolean(wanted));
                }
            }
            Ok(interp.boolean(!wanted))
        }
        Function::Index => index(interp, host, args, env),
        Function::Match => lookup(interp, host, args, env),
        Function::Choose => {
            let chosen = interp.eval(host, arg(args, 0)?, env)?;
            let chosen = integer(interp, &chosen)?;
            match usize::try_from(chosen) {
                Ok(n) if n >= 1 && n < args.len() => interp.eval(host, args[n], env),
                _ => Err(EvalError::Value(format!(
                    "CHOOSE index {} is not between 1 and {}",
                    chosen,
                    args.len() - 1
                ))),
            }
        }
        Function::Now => {
            let now = Local::now().naive_local();
            Ok(Value::Number(
                numeric.from_f64(formcomp_core::cell::excel_serial(&now))?,
            ))
        }
        Function::Today => {
            let today = Local::now().date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
            Ok(Value::Number(
                numeric.from_f64(formcomp_core::cell::excel_serial(&today))?,
            ))
        }
        Function::Rand => Ok(Value::Number(numeric.from_f64(rand::random::<f64>())?)),
        _ => {
            let values = args
                .iter()
                .map(|a| interp.eval(host, *a, env))
                .collect::<EvalResult<Vec<_>>>()?;
            strict(interp, function, &values)
        }
    }
}

fn arg(args: &[ExprId], position: usize) -> EvalResult<ExprId> {
    args.get(position)
        .copied()
        .ok_or_else(|| EvalError::Internal(format!("missing argument {}", position + 1)))
}

fn value(values: &[Value], position: usize) -> EvalResult<&Value> {
    values
        .get(position)
        .ok_or_else(|| EvalError::Internal(format!("missing argument {}", position + 1)))
}

fn integer(interp: &Interpreter<'_>, value: &Value) -> EvalResult<i64> {
    let n = interp.number(value)?.to_f64().trunc();
    if n.abs() > i64::MAX as f64 {
        return Err(NumericError::Overflow.into());
    }
    Ok(n as i64)
}

/// Functions of already evaluated arguments
fn strict(interp: &Interpreter<'_>, function: Function, values: &[Value]) -> EvalResult<Value> {
    let numeric = interp.numeric();
    let number = |position: usize| -> EvalResult<Number> { interp.number(value(values, position)?) };
    let text = |position: usize| -> EvalResult<String> { Ok(interp.text(value(values, position)?)) };
    let count = |position: usize, default: i64| -> EvalResult<usize> {
        let n = match values.get(position) {
            Some(v) => integer(interp, v)?,
            None => default,
        };
        usize::try_from(n).map_err(|_| EvalError::Value(format!("negative length {}", n)))
    };

    let result = match function {
        Function::Not => interp.boolean(!interp.truth(value(values, 0)?)?),
        Function::Abs => {
            let n = number(0)?;
            if numeric.compare(&n, &numeric.zero()).is_lt() {
                Value::Number(numeric.neg(&n)?)
            } else {
                Value::Number(n)
            }
        }
        Function::Sign => {
            let sign = match numeric.compare(&number(0)?, &numeric.zero()) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            Value::Number(numeric.from_i64(sign)?)
        }
        Function::Int => Value::Number(numeric.round(&number(0)?, 0, RoundingMode::Floor)?),
        Function::Mod => {
            let (a, b) = (number(0)?, number(1)?);
            let quotient = numeric.round(&numeric.div(&a, &b)?, 0, RoundingMode::Floor)?;
            Value::Number(numeric.sub(&a, &numeric.mul(&b, &quotient)?)?)
        }
        Function::Sqrt => Value::Number(unary(interp, number(0)?, Unary::Sqrt)?),
        Function::Exp => Value::Number(unary(interp, number(0)?, Unary::Exp)?),
        Function::Ln => Value::Number(unary(interp, number(0)?, Unary::Ln)?),
        Function::Round | Function::RoundUp | Function::RoundDown => {
            let digits = integer(interp, value(values, 1)?)?;
            let digits = i32::try_from(digits).map_err(|_| NumericError::Overflow)?;
            let mode = match function {
                Function::RoundUp => RoundingMode::Up,
                Function::RoundDown => RoundingMode::Down,
                _ => RoundingMode::HalfUp,
            };
            Value::Number(numeric.round(&number(0)?, digits, mode)?)
        }
        Function::Concatenate => Value::Text(values.iter().map(|v| interp.text(v)).collect()),
        Function::Left => Value::Text(take_left(&text(0)?, count(1, 1)?)),
        Function::Right => Value::Text(take_right(&text(0)?, count(1, 1)?)),
        Function::Mid => {
            let start = count(1, 1)?;
            if start == 0 {
                return Err(EvalError::Value("MID start must be at least 1".into()));
            }
            Value::Text(take_mid(&text(0)?, start, count(2, 0)?))
        }
        Function::Upper => Value::Text(text(0)?.to_uppercase()),
        Function::Lower => Value::Text(text(0)?.to_lowercase()),
        Function::Trim => Value::Text(text(0)?.split_whitespace().collect::<Vec<_>>().join(" ")),
        Function::Len => Value::Number(numeric.from_i64(text(0)?.chars().count() as i64)?),
        Function::If
        | Function::And
        | Function::Or
        | Function::Index
        | Function::Match
        | Function::Choose
        | Function::Now
        | Function::Today
        | Function::Rand => {
            return Err(EvalError::Internal(format!("{} evaluated eagerly", function)))
        }
        Function::SumIf
        | Function::CountIf
        | Function::Database(_)
        | Function::VLookup
        | Function::HLookup => {
            return Err(EvalError::Internal(format!("{} was not rewritten", function)))
        }
    };
    Ok(result)
}

#[derive(Clone, Copy)]
enum Unary {
    Sqrt,
    Exp,
    Ln,
}

/// Transcendental functions: binary doubles stay in `f64`, decimals use decimal series
fn unary(interp: &Interpreter<'_>, n: Number, f: Unary) -> EvalResult<Number> {
    let numeric = interp.numeric();
    if let Number::Double(x) = n {
        let result = match f {
            Unary::Sqrt if x < 0.0 => return Err(NumericError::Domain("SQRT").into()),
            Unary::Ln if x <= 0.0 => return Err(NumericError::Domain("LN").into()),
            Unary::Sqrt => x.sqrt(),
            Unary::Exp => x.exp(),
            Unary::Ln => x.ln(),
        };
        if !result.is_finite() {
            return Err(NumericError::Overflow.into());
        }
        return Ok(numeric.from_f64(result)?);
    }

    let x = n.to_decimal()?;
    let result = match f {
        Unary::Sqrt => x.sqrt().ok_or(NumericError::Domain("SQRT"))?,
        Unary::Exp => x.checked_exp().ok_or(NumericError::Overflow)?,
        Unary::Ln => x.checked_ln().ok_or(NumericError::Domain("LN"))?,
    };
    Ok(numeric.from_decimal(result)?)
}

/// `INDEX(range, row[, col])`, 1-based; a single row or column takes one index
fn index<H: Host>(
    interp: &Interpreter<'_>,
    host: &H,
    args: &[ExprId],
    env: &mut Env,
) -> EvalResult<Value> {
    let row_value = interp.eval(host, arg(args, 1)?, env)?;
    let row = integer(interp, &row_value)?;
    let col = match args.get(2) {
        Some(id) => {
            let col_value = interp.eval(host, *id, env)?;
            Some(integer(interp, &col_value)?)
        }
        None => None,
    };
    index_in(interp, host, arg(args, 0)?, row, col, env)
}

fn index_in<H: Host>(
    interp: &Interpreter<'_>,
    host: &H,
    target: ExprId,
    row: i64,
    col: Option<i64>,
    env: &mut Env,
) -> EvalResult<Value> {
    let out_of_range = || EvalError::Reference(format!("INDEX({}, {:?})", row, col));
    match interp.node(target) {
        ExprNode::ParentSection { section, expr } => {
            let parent = host.parent(*section)?;
            index_in(interp, &parent, *expr, row, col, env)
        }
        node @ ExprNode::Range { rows, cols, .. } => {
            let (rows, cols) = (i64::from(*rows), i64::from(*cols));
            let (r, c) = match col {
                Some(c) => (row, c),
                None if rows == 1 => (1, row),
                None => (row, 1),
            };
            if r < 1 || c < 1 || r > rows || c > cols {
                return Err(out_of_range());
            }
            let offset = u64::try_from((r - 1) * cols + (c - 1)).map_err(|_| out_of_range())?;
            match node.element_at(offset) {
                Some(element) => interp.eval(host, element, env),
                None => Ok(Value::Null),
            }
        }
        _ => {
            if row != 1 || col.map_or(false, |c| c != 1) {
                return Err(out_of_range());
            }
            interp.eval(host, target, env)
        }
    }
}

/// `MATCH(value, range[, type])`: 1-based position in a single row or column
///
/// Type 0 wants an equal element, 1 the last element not greater than `value` (ascending
/// data), -1 the last element not less than `value` (descending data). Blanks and elements of
/// the other kind (number or text) never match.
fn lookup<H: Host>(
    interp: &Interpreter<'_>,
    host: &H,
    args: &[ExprId],
    env: &mut Env,
) -> EvalResult<Value> {
    let wanted = interp.eval(host, arg(args, 0)?, env)?;
    let kind = match args.get(2) {
        Some(id) => {
            let kind = interp.eval(host, *id, env)?;
            integer(interp, &kind)?.signum()
        }
        None => 1,
    };
    if matches!(wanted, Value::Null) {
        return Err(EvalError::NotAvailable("MATCH of a blank value".into()));
    }

    let mut found = None;
    for (position, value) in line(interp, host, arg(args, 1)?, env)? {
        let ordering = match (&wanted, &value) {
            (Value::Number(_), Value::Number(_)) | (Value::Text(_), Value::Text(_)) => {
                interp.compare(&value, &wanted)?
            }
            _ => continue,
        };
        match (kind, ordering) {
            (0, Ordering::Equal) => return Ok(position_value(interp, position)?),
            (0, _) => {}
            (1, Ordering::Greater) | (-1, Ordering::Less) => break,
            _ => found = Some(position),
        }
    }
    match found {
        Some(position) => position_value(interp, position),
        None => Err(EvalError::NotAvailable(format!("MATCH found no {}", interp.text(&wanted)))),
    }
}

fn position_value(interp: &Interpreter<'_>, position: u64) -> EvalResult<Value> {
    let position = i64::try_from(position + 1).map_err(|_| NumericError::Overflow)?;
    Ok(Value::Number(interp.numeric().from_i64(position)?))
}

/// Non-blank elements of a single row or column with their 0-based positions
fn line<H: Host>(
    interp: &Interpreter<'_>,
    host: &H,
    target: ExprId,
    env: &mut Env,
) -> EvalResult<Vec<(u64, Value)>> {
    match interp.node(target) {
        ExprNode::ParentSection { section, expr } => {
            let parent = host.parent(*section)?;
            line(interp, &parent, *expr, env)
        }
        ExprNode::Range {
            rows,
            cols,
            positions,
            elements,
        } => {
            if *rows > 1 && *cols > 1 {
                return Err(EvalError::Value(format!(
                    "lookup range of {} rows and {} columns is not a single row or column",
                    rows, cols
                )));
            }
            let mut values = Vec::with_capacity(elements.len());
            for (position, element) in positions.iter().zip(elements) {
                let value = interp.eval(host, *element, env)?;
                if !matches!(value, Value::Null) {
                    values.push((*position, value));
                }
            }
            Ok(values)
        }
        _ => {
            let value = interp.eval(host, target, env)?;
            Ok(match value {
                Value::Null => Vec::new(),
                value => vec![(0, value)],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::interpreter::NoFrame;
    use crate::model::{ExprArena, Operator};
    use crate::numeric::{DoubleType, NumericType, NumericTypeSpec};
    use pretty_assertions::assert_eq;

    struct Calls {
        arena: ExprArena,
    }

    impl Calls {
        fn new() -> Self {
            Self {
                arena: ExprArena::new(),
            }
        }

        fn value(&mut self, value: impl Into<Value>) -> ExprId {
            self.arena.add(ExprNode::constant(value))
        }

        fn call(&mut self, function: Function, args: Vec<ExprId>) -> EvalResult<Value> {
            self.call_with(&DoubleType, function, args)
        }

        fn call_with(
            &mut self,
            numeric: &dyn NumericType,
            function: Function,
            args: Vec<ExprId>,
        ) -> EvalResult<Value> {
            let id = self.arena.add(ExprNode::Function { function, args });
            Interpreter::new(&self.arena, numeric).eval(&NoFrame, id, &mut Env::new())
        }
    }

    #[test]
    fn test_if_is_lazy() {
        let mut c = Calls::new();
        let yes = c.value(1.0);
        let no = c.value(0.0);
        let result = c.value("ok");
        let one = c.value(1.0);
        let broken = c.arena.add(ExprNode::op(Operator::Divide, vec![one, no]));

        assert_eq!(c.call(Function::If, vec![yes, result, broken]).unwrap(), Value::text("ok"));
        assert_eq!(c.call(Function::If, vec![no, broken]).unwrap(), Value::from(false));
        assert_eq!(c.call(Function::Or, vec![yes, broken]).unwrap(), Value::from(true));
        assert_eq!(c.call(Function::And, vec![no, broken]).unwrap(), Value::from(false));
        assert!(c.call(Function::And, vec![yes, broken]).is_err());
    }

    #[test]
    fn test_math() {
        let mut c = Calls::new();
        let neg = c.value(-7.5);
        let three = c.value(3.0);
        let two = c.value(2.0);
        let digits = c.value(1.0);
        let value = c.value(2.25);
        let nine = c.value(9.0);

        assert_eq!(c.call(Function::Abs, vec![neg]).unwrap(), Value::from(7.5));
        assert_eq!(c.call(Function::Sign, vec![neg]).unwrap(), Value::from(-1.0));
        assert_eq!(c.call(Function::Int, vec![neg]).unwrap(), Value::from(-8.0));
        assert_eq!(c.call(Function::Mod, vec![neg, two]).unwrap(), Value::from(0.5));
        assert_eq!(c.call(Function::Mod, vec![three, two]).unwrap(), Value::from(1.0));
        assert_eq!(c.call(Function::Sqrt, vec![nine]).unwrap(), Value::from(3.0));
        assert_eq!(c.call(Function::Round, vec![value, digits]).unwrap(), Value::from(2.3));
        assert_eq!(c.call(Function::RoundDown, vec![value, digits]).unwrap(), Value::from(2.2));
        assert_eq!(c.call(Function::RoundUp, vec![neg, digits]).unwrap(), Value::from(-7.5));
        assert!(matches!(
            c.call(Function::Sqrt, vec![neg]),
            Err(EvalError::Numeric(NumericError::Domain(_)))
        ));
        assert!(matches!(
            c.call(Function::Ln, vec![neg]),
            Err(EvalError::Numeric(NumericError::Domain(_)))
        ));
    }

    #[test]
    fn test_decimal_sqrt() {
        let numeric = NumericTypeSpec::decimal(4, RoundingMode::HalfUp).build().unwrap();
        let mut c = Calls::new();
        let two = c.arena.add(ExprNode::Constant(Value::Number(numeric.parse("2").unwrap())));
        let root = c.call_with(numeric.as_ref(), Function::Sqrt, vec![two]).unwrap();
        assert_eq!(root.format(numeric.as_ref()), "1.4142");
    }

    #[test]
    fn test_text() {
        let mut c = Calls::new();
        let word = c.value("  Hello   World ");
        let hello = c.value("Hello");
        let two = c.value(2.0);
        let number = c.value(1.5);

        assert_eq!(c.call(Function::Trim, vec![word]).unwrap(), Value::text("Hello World"));
        assert_eq!(c.call(Function::Left, vec![hello]).unwrap(), Value::text("H"));
        assert_eq!(c.call(Function::Right, vec![hello, two]).unwrap(), Value::text("lo"));
        assert_eq!(c.call(Function::Mid, vec![hello, two, two]).unwrap(), Value::text("el"));
        assert_eq!(c.call(Function::Upper, vec![hello]).unwrap(), Value::text("HELLO"));
        assert_eq!(c.call(Function::Len, vec![hello]).unwrap(), Value::from(5.0));
        assert_eq!(
            c.call(Function::Concatenate, vec![hello, number]).unwrap(),
            Value::text("Hello1.5")
        );
    }

    #[test]
    fn test_index() {
        let mut c = Calls::new();
        let cells: Vec<_> = (1..=6).map(|n| c.value(f64::from(n))).collect();
        let grid = c.arena.add(ExprNode::range(2, 3, cells.clone()));
        let row = c.arena.add(ExprNode::range(1, 3, cells[..3].to_vec()));
        let (one, two, three, seven) = (c.value(1.0), c.value(2.0), c.value(3.0), c.value(7.0));

        assert_eq!(c.call(Function::Index, vec![grid, two, three]).unwrap(), Value::from(6.0));
        assert_eq!(c.call(Function::Index, vec![grid, two]).unwrap(), Value::from(4.0));
        assert_eq!(c.call(Function::Index, vec![row, three]).unwrap(), Value::from(3.0));
        assert_eq!(c.call(Function::Index, vec![one, one]).unwrap(), Value::from(1.0));
        assert!(matches!(
            c.call(Function::Index, vec![grid, seven]),
            Err(EvalError::Reference(_))
        ));
    }

    #[test]
    fn test_volatile_functions() {
        let mut c = Calls::new();
        let now = c.call(Function::Now, Vec::new()).unwrap().to_f64().unwrap();
        let today = c.call(Function::Today, Vec::new()).unwrap().to_f64().unwrap();
        let rand = c.call(Function::Rand, Vec::new()).unwrap().to_f64().unwrap();
        assert!(today <= now && now - today < 1.0);
        assert!(today > 40_000.0);
        assert!((0.0..1.0).contains(&rand));
    }
}
