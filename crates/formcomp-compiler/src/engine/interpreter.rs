//! Expression evaluation over an abstract frame

use std::cmp::Ordering;

use crate::error::{EvalError, EvalResult};
use crate::model::{CellId, ExprArena, ExprId, ExprNode, Operator, SectionId};
use crate::numeric::{Number, NumericType};
use crate::value::Value;

use super::builtins;

/// Where cell values and section repetitions come from during evaluation
pub(crate) trait Host: Sized {
    /// Value of a cell of the host's section
    fn cell(&self, cell: CellId) -> EvalResult<Value>;

    /// Frame of the section enclosing `section`, the host's own section
    fn parent(&self, section: SectionId) -> EvalResult<Self>;

    /// One frame per repetition of the child section `section`
    fn rows(&self, section: SectionId) -> EvalResult<Vec<Self>>;
}

/// Host for compile-time evaluation: anything frame-dependent is not constant
pub(crate) struct NoFrame;

impl Host for NoFrame {
    fn cell(&self, _cell: CellId) -> EvalResult<Value> {
        Err(EvalError::Internal("cell value is not constant".into()))
    }

    fn parent(&self, _section: SectionId) -> EvalResult<Self> {
        Err(EvalError::Internal("section reference is not constant".into()))
    }

    fn rows(&self, _section: SectionId) -> EvalResult<Vec<Self>> {
        Err(EvalError::Internal("section reference is not constant".into()))
    }
}

/// Local variables of `let` and `fold`, innermost last
pub(crate) type Env = Vec<(String, Value)>;

pub(crate) struct Interpreter<'a> {
    exprs: &'a ExprArena,
    numeric: &'a dyn NumericType,
}

impl<'a> Interpreter<'a> {
    pub fn new(exprs: &'a ExprArena, numeric: &'a dyn NumericType) -> Self {
        Self { exprs, numeric }
    }

    pub fn numeric(&self) -> &'a dyn NumericType {
        self.numeric
    }

    pub fn node(&self, id: ExprId) -> &'a ExprNode {
        self.exprs.get(id)
    }

    pub fn eval<H: Host>(&self, host: &H, id: ExprId, env: &mut Env) -> EvalResult<Value> {
        match self.node(id) {
            ExprNode::Constant(value) => Ok(value.clone()),
            ExprNode::CellRef(cell) => host.cell(*cell),
            node @ ExprNode::Range { rows: 1, cols: 1, .. } => match node.element_at(0) {
                Some(single) => self.eval(host, single, env),
                None => Ok(Value::Null),
            },
            ExprNode::Range { .. } => {
                Err(EvalError::Value("a range cannot be used as a single value".into()))
            }
            ExprNode::Operator { op, args } => self.operator(host, *op, args, env),
            ExprNode::Function { function, args } => {
                builtins::call(self, host, *function, args, env)
            }
            ExprNode::Aggregate { aggregator, .. } => Err(EvalError::Internal(format!(
                "{} was not rewritten into a fold",
                aggregator
            ))),
            ExprNode::Fold {
                acc,
                elt,
                seed,
                step,
                when_empty,
                source,
            } => {
                let items = self.numbers(host, source, env)?;
                if items.is_empty() {
                    if let Some(empty) = when_empty {
                        return self.eval(host, *empty, env);
                    }
                }
                let mut value = self.eval(host, *seed, env)?;
                for item in items {
                    env.push((acc.clone(), value));
                    env.push((elt.clone(), Value::Number(item)));
                    let next = self.eval(host, *step, env);
                    env.truncate(env.len() - 2);
                    value = next?;
                }
                Ok(value)
            }
            ExprNode::Count { source } => {
                let count = self.numbers(host, source, env)?.len();
                Ok(Value::Number(self.numeric.from_i64(count as i64)?))
            }
            ExprNode::Let { name, value, body } => {
                let value = self.eval(host, *value, env)?;
                env.push((name.clone(), value));
                let result = self.eval(host, *body, env);
                env.pop();
                result
            }
            ExprNode::LetVar(name) => env
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| EvalError::Internal(format!("unbound variable {}", name))),
            ExprNode::ParentSection { section, expr } => {
                let parent = host.parent(*section)?;
                self.eval(&parent, *expr, env)
            }
            ExprNode::SubSection { .. } => Err(EvalError::Value(
                "a repeating section cannot be used as a single value".into(),
            )),
        }
    }

    /// Values of every element of the sources, flattening ranges and section repetitions
    pub fn collect<H: Host>(
        &self,
        host: &H,
        ids: &[ExprId],
        env: &mut Env,
        out: &mut Vec<Value>,
    ) -> EvalResult<()> {
        for id in ids {
            match self.node(*id) {
                ExprNode::Range { elements, .. } => self.collect(host, elements, env, out)?,
                ExprNode::SubSection { section, elements } => {
                    for row in host.rows(*section)? {
                        self.collect(&row, elements, env, out)?;
                    }
                }
                ExprNode::ParentSection { section, expr } => {
                    let parent = host.parent(*section)?;
                    self.collect(&parent, std::slice::from_ref(expr), env, out)?;
                }
                _ => out.push(self.eval(host, *id, env)?),
            }
        }
        Ok(())
    }

    /// Numeric elements of the sources; text and blanks are skipped
    fn numbers<H: Host>(&self, host: &H, ids: &[ExprId], env: &mut Env) -> EvalResult<Vec<Number>> {
        let mut values = Vec::new();
        self.collect(host, ids, env, &mut values)?;
        Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Value::Number(n) => Some(n),
                _ => None,
            })
            .collect())
    }

    fn operator<H: Host>(
        &self,
        host: &H,
        op: Operator,
        args: &[ExprId],
        env: &mut Env,
    ) -> EvalResult<Value> {
        let numeric = self.numeric;
        let values = args
            .iter()
            .map(|a| self.eval(host, *a, env))
            .collect::<EvalResult<Vec<_>>>()?;

        let result = match (op, values.as_slice()) {
            (Operator::Noop, _) => Value::Null,
            (Operator::Negate, [a]) => Value::Number(numeric.neg(&self.number(a)?)?),
            (Operator::Percent, [a]) => {
                let hundred = numeric.from_i64(100)?;
                Value::Number(numeric.div(&self.number(a)?, &hundred)?)
            }
            (Operator::Concat, [a, b]) => Value::Text(self.text(a) + &self.text(b)),
            (op, [a, b]) if op.is_comparison() => {
                let ordering = self.compare(a, b)?;
                let holds = match op {
                    Operator::Equal => ordering == Ordering::Equal,
                    Operator::NotEqual => ordering != Ordering::Equal,
                    Operator::Less => ordering == Ordering::Less,
                    Operator::LessOrEqual => ordering != Ordering::Greater,
                    Operator::Greater => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                self.boolean(holds)
            }
            (op, [a, b]) => {
                let (a, b) = (self.number(a)?, self.number(b)?);
                Value::Number(match op {
                    Operator::Plus => numeric.add(&a, &b)?,
                    Operator::Minus => numeric.sub(&a, &b)?,
                    Operator::Times => numeric.mul(&a, &b)?,
                    Operator::Divide => numeric.div(&a, &b)?,
                    Operator::Power => numeric.pow(&a, &b)?,
                    Operator::Min => match numeric.compare(&a, &b) {
                        Ordering::Greater => b,
                        _ => a,
                    },
                    Operator::Max => match numeric.compare(&a, &b) {
                        Ordering::Less => b,
                        _ => a,
                    },
                    _ => return Err(self.arity(op, args.len())),
                })
            }
            _ => return Err(self.arity(op, args.len())),
        };
        Ok(result)
    }

    fn arity(&self, op: Operator, count: usize) -> EvalError {
        EvalError::Internal(format!("operator {} applied to {} operands", op.symbol(), count))
    }

    // === Coercions ===

    /// Numeric view of a value: blanks are zero, text must parse
    pub fn number(&self, value: &Value) -> EvalResult<Number> {
        match value {
            Value::Null => Ok(self.numeric.zero()),
            Value::Number(n) => Ok(n.clone()),
            Value::Text(s) => self
                .numeric
                .parse(s)
                .map_err(|_| EvalError::Value(format!("\"{}\" is not a number", s))),
        }
    }

    pub fn text(&self, value: &Value) -> String {
        value.format(self.numeric)
    }

    /// Truth of a condition: non-zero numbers, `TRUE`/`FALSE` text
    pub fn truth(&self, value: &Value) -> EvalResult<bool> {
        match value {
            Value::Null => Ok(false),
            Value::Number(n) => Ok(!n.is_zero()),
            Value::Text(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::Text(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            Value::Text(s) => Err(EvalError::Value(format!("\"{}\" is not a condition", s))),
        }
    }

    pub fn boolean(&self, value: bool) -> Value {
        Value::Number(if value {
            self.numeric.one()
        } else {
            self.numeric.zero()
        })
    }

    /// Numbers sort before text; text compares case-insensitively; blanks match either
    pub fn compare(&self, a: &Value, b: &Value) -> EvalResult<Ordering> {
        Ok(match (a, b) {
            (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Value::Text(x), Value::Null) => x.as_str().cmp(""),
            (Value::Null, Value::Text(y)) => "".cmp(y.as_str()),
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (a, b) => self.numeric.compare(&self.number(a)?, &self.number(b)?),
        })
    }
}
