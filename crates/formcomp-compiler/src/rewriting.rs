//! Rewriting aggregates into primitive folds
//!
//! `SUM(xs)` becomes `fold(acc = 0, x: acc + x over xs)`; the other aggregators are expressed
//! with the same fold plus `count`, `let` and `SQRT`. Conditional aggregates (`SUMIF`,
//! `COUNTIF`, `DSUM` and the other database functions) fold over a range whose elements are
//! `IF(criterion, value, noop)`, since folds skip blanks. `VLOOKUP` and `HLOOKUP` become
//! `INDEX` over the table with a `MATCH` on its first column or row. The rewrite runs before
//! type annotation so later passes only ever see primitive reductions.

use std::collections::HashMap;

use formcomp_formula::{Aggregator, Function};
use tracing::{debug, debug_span, trace};

use crate::error::{CompilerError, CompilerResult};
use crate::model::{ComputationModel, ExprId, ExprNode, Operator, SectionId};
use crate::numeric::{Number, NumericType};
use crate::value::Value;

/// Comparison prefixes of by-example criteria, longest first
const COMPARISONS: [(&str, Operator); 6] = [
    ("<>", Operator::NotEqual),
    ("<=", Operator::LessOrEqual),
    (">=", Operator::GreaterOrEqual),
    ("=", Operator::Equal),
    ("<", Operator::Less),
    (">", Operator::Greater),
];

/// Non-blank elements of a range operand by row-major offset
struct Grid {
    rows: u32,
    cols: u32,
    entries: Vec<(u64, ExprId)>,
}

impl Grid {
    fn at(&self, row: u32, col: u32) -> Option<ExprId> {
        let offset = u64::from(row) * u64::from(self.cols) + u64::from(col);
        self.entries
            .binary_search_by_key(&offset, |(position, _)| *position)
            .ok()
            .map(|i| self.entries[i].1)
    }
}

/// Replaces every `Aggregate` node reachable from a cell with primitive folds, and the
/// conditional and lookup functions with folds and `INDEX`/`MATCH`
pub struct ModelRewriter<'a> {
    numeric: &'a dyn NumericType,
    memo: HashMap<ExprId, ExprId>,
    fresh: usize,
}

impl<'a> ModelRewriter<'a> {
    pub fn new(numeric: &'a dyn NumericType) -> Self {
        Self {
            numeric,
            memo: HashMap::new(),
            fresh: 0,
        }
    }

    /// Rewrite all cell expressions in place; returns the number of calls replaced
    pub fn rewrite(&mut self, model: &mut ComputationModel) -> CompilerResult<usize> {
        let span = debug_span!("rewrite");
        let _enter = span.enter();

        let before = self.fresh;
        for id in model.cell_ids() {
            let Some(root) = model.cell(id).expression else {
                continue;
            };
            let rewritten = self
                .rewrite_expr(model, root)
                .map_err(|e| e.in_cell(model.cell(id).name.clone()))?;
            if rewritten != root {
                trace!(cell = %model.cell(id).name, "rewrote aggregates");
                model.cell_mut(id).expression = Some(rewritten);
            }
        }
        let count = self.fresh - before;
        debug!(aggregates = count, "rewrote aggregates into folds");
        Ok(count)
    }

    fn rewrite_expr(&mut self, model: &mut ComputationModel, id: ExprId) -> CompilerResult<ExprId> {
        if let Some(done) = self.memo.get(&id) {
            return Ok(*done);
        }
        let children = model
            .expr(id)
            .children()
            .into_iter()
            .map(|child| self.rewrite_expr(model, child))
            .collect::<CompilerResult<Vec<_>>>()?;
        let rebuilt = model.exprs_mut().rebuild(id, children);
        let result = match model.expr(rebuilt) {
            ExprNode::Aggregate { aggregator, args } => {
                let (aggregator, args) = (*aggregator, args.clone());
                self.expand(model, aggregator, args)
            }
            ExprNode::Function { function, args } => {
                let (function, args) = (*function, args.clone());
                self.rewrite_function(model, rebuilt, function, &args)?
            }
            _ => rebuilt,
        };
        self.memo.insert(id, result);
        Ok(result)
    }

    fn rewrite_function(
        &mut self,
        model: &mut ComputationModel,
        id: ExprId,
        function: Function,
        args: &[ExprId],
    ) -> CompilerResult<ExprId> {
        match function {
            Function::SumIf => {
                let tested = arg(args, 0)?;
                let summed = args.get(2).copied().unwrap_or(tested);
                let filtered = self.filter(model, id, tested, arg(args, 1)?, Some(summed))?;
                Ok(self.expand(model, Aggregator::Sum, vec![filtered]))
            }
            Function::CountIf => {
                let filtered = self.filter(model, id, arg(args, 0)?, arg(args, 1)?, None)?;
                Ok(self.expand(model, Aggregator::Count, vec![filtered]))
            }
            Function::Database(aggregator) => {
                let selected = self.database(model, id, args)?;
                Ok(self.expand(model, aggregator, vec![selected]))
            }
            Function::VLookup | Function::HLookup => self.lookup(model, id, function, args),
            _ => Ok(id),
        }
    }

    fn expand(
        &mut self,
        model: &mut ComputationModel,
        aggregator: Aggregator,
        source: Vec<ExprId>,
    ) -> ExprId {
        self.fresh += 1;
        let zero = self.numeric.zero();
        match aggregator {
            Aggregator::Sum => self.sum(model, source),
            Aggregator::Product => {
                let one = self.constant(model, self.numeric.one());
                let zero = self.constant(model, zero);
                self.fold(model, source, one, Some(zero), |model, acc, x| {
                    model.add_expr(ExprNode::op(Operator::Times, vec![acc, x]))
                })
            }
            Aggregator::Min => {
                let seed = self.constant(model, self.numeric.max_value());
                let zero = self.constant(model, zero);
                self.fold(model, source, seed, Some(zero), |model, acc, x| {
                    model.add_expr(ExprNode::op(Operator::Min, vec![acc, x]))
                })
            }
            Aggregator::Max => {
                let seed = self.constant(model, self.numeric.min_value());
                let zero = self.constant(model, zero);
                self.fold(model, source, seed, Some(zero), |model, acc, x| {
                    model.add_expr(ExprNode::op(Operator::Max, vec![acc, x]))
                })
            }
            Aggregator::Count => model.add_expr(ExprNode::Count { source }),
            Aggregator::Average => {
                let sum = self.sum(model, source.clone());
                let count = model.add_expr(ExprNode::Count { source });
                model.add_expr(ExprNode::op(Operator::Divide, vec![sum, count]))
            }
            Aggregator::VarP => self.variance(model, source, false),
            Aggregator::Var => self.variance(model, source, true),
            Aggregator::StDevP => {
                let variance = self.variance(model, source, false);
                Self::sqrt(model, variance)
            }
            Aggregator::StDev => {
                let variance = self.variance(model, source, true);
                Self::sqrt(model, variance)
            }
        }
    }

    fn constant(&self, model: &mut ComputationModel, number: Number) -> ExprId {
        model.add_expr(ExprNode::Constant(Value::Number(number)))
    }

    fn name(&self, prefix: &str) -> String {
        format!("{}__{}", prefix, self.fresh)
    }

    fn sum(&mut self, model: &mut ComputationModel, source: Vec<ExprId>) -> ExprId {
        let zero = self.constant(model, self.numeric.zero());
        self.fold(model, source, zero, None, |model, acc, x| {
            model.add_expr(ExprNode::op(Operator::Plus, vec![acc, x]))
        })
    }

    fn fold(
        &mut self,
        model: &mut ComputationModel,
        source: Vec<ExprId>,
        seed: ExprId,
        when_empty: Option<ExprId>,
        step: impl FnOnce(&mut ComputationModel, ExprId, ExprId) -> ExprId,
    ) -> ExprId {
        let (acc, elt) = (self.name("acc"), self.name("x"));
        let acc_var = model.add_expr(ExprNode::LetVar(acc.clone()));
        let elt_var = model.add_expr(ExprNode::LetVar(elt.clone()));
        let step = step(model, acc_var, elt_var);
        model.add_expr(ExprNode::Fold {
            acc,
            elt,
            seed,
            step,
            when_empty,
            source,
        })
    }

    /// `let n = count(xs) in let m = sum(xs) / n in fold(r = 0, x: r + (x - m)^2 over xs) / n`
    fn variance(&mut self, model: &mut ComputationModel, source: Vec<ExprId>, sample: bool) -> ExprId {
        let (n, mean, deviation) = (self.name("n"), self.name("mean"), self.name("dev"));
        let n_var = model.add_expr(ExprNode::LetVar(n.clone()));
        let mean_var = model.add_expr(ExprNode::LetVar(mean.clone()));

        let count = model.add_expr(ExprNode::Count {
            source: source.clone(),
        });
        let sum = self.sum(model, source.clone());
        let mean_value = model.add_expr(ExprNode::op(Operator::Divide, vec![sum, n_var]));

        let zero = self.constant(model, self.numeric.zero());
        let squares = self.fold(model, source, zero, None, |model, acc, x| {
            let dev_var = model.add_expr(ExprNode::LetVar(deviation.clone()));
            let diff = model.add_expr(ExprNode::op(Operator::Minus, vec![x, mean_var]));
            let square = model.add_expr(ExprNode::op(Operator::Times, vec![dev_var, dev_var]));
            let next = model.add_expr(ExprNode::op(Operator::Plus, vec![acc, square]));
            model.add_expr(ExprNode::Let {
                name: deviation,
                value: diff,
                body: next,
            })
        });

        let divisor = if sample {
            let one = self.constant(model, self.numeric.one());
            model.add_expr(ExprNode::op(Operator::Minus, vec![n_var, one]))
        } else {
            n_var
        };
        let quotient = model.add_expr(ExprNode::op(Operator::Divide, vec![squares, divisor]));
        let inner = model.add_expr(ExprNode::Let {
            name: mean,
            value: mean_value,
            body: quotient,
        });
        model.add_expr(ExprNode::Let {
            name: n,
            value: count,
            body: inner,
        })
    }

    fn sqrt(model: &mut ComputationModel, value: ExprId) -> ExprId {
        model.add_expr(ExprNode::Function {
            function: Function::Sqrt,
            args: vec![value],
        })
    }

    // === Conditional folds ===

    /// Range of `IF(criterion(tested), value, noop)`, one element per non-blank tested cell
    ///
    /// `value` is the element of `values` at the same offset, or 1 when there is none.
    fn filter(
        &mut self,
        model: &mut ComputationModel,
        call: ExprId,
        tested: ExprId,
        criterion: ExprId,
        values: Option<ExprId>,
    ) -> CompilerResult<ExprId> {
        let (tested_chain, tested) = unwrap_parents(model, tested);
        let tested = grid(model, call, tested)?;
        let values = match values {
            Some(values) => {
                let (chain, values) = unwrap_parents(model, values);
                let values = grid(model, call, values)?;
                if (values.rows, values.cols) != (tested.rows, tested.cols) {
                    return Err(CompilerError::unsupported(
                        model.describe_expr(call),
                        "the tested and summed ranges differ in shape",
                    ));
                }
                Some((chain, values))
            }
            None => None,
        };

        let one = self.constant(model, self.numeric.one());
        let noop = model.add_expr(ExprNode::op(Operator::Noop, Vec::new()));
        let mut entries = Vec::with_capacity(tested.entries.len());
        for (offset, element) in &tested.entries {
            let value = match &values {
                Some((chain, values)) => match values
                    .entries
                    .binary_search_by_key(offset, |(position, _)| *position)
                {
                    Ok(i) => wrap_parents(model, chain, values.entries[i].1),
                    Err(_) => continue,
                },
                None => one,
            };
            let subject = wrap_parents(model, &tested_chain, *element);
            let condition = self.criterion(model, subject, criterion);
            let chosen = model.add_expr(ExprNode::Function {
                function: Function::If,
                args: vec![condition, value, noop],
            });
            entries.push((*offset, chosen));
        }
        Ok(model.add_expr(ExprNode::sparse_range(tested.rows, tested.cols, entries)))
    }

    /// Comparison of `subject` against a criterion given by example
    ///
    /// A text criterion may start with `=`, `<>`, `<`, `<=`, `>` or `>=`; the rest is read as a
    /// number when it parses as one. `">" & x` compares with `x` itself. Anything else is tested
    /// for equality.
    fn criterion(&self, model: &mut ComputationModel, subject: ExprId, criterion: ExprId) -> ExprId {
        if let Some(Value::Text(example)) = constant_of(model, criterion) {
            let (op, rest) = COMPARISONS
                .iter()
                .find_map(|(prefix, op)| example.strip_prefix(prefix).map(|rest| (*op, rest)))
                .unwrap_or((Operator::Equal, example.as_str()));
            let operand = match self.numeric.parse(rest) {
                Ok(number) if !rest.trim().is_empty() => Value::Number(number),
                _ => Value::Text(rest.to_string()),
            };
            let operand = model.add_expr(ExprNode::Constant(operand));
            return model.add_expr(ExprNode::op(op, vec![subject, operand]));
        }
        if let ExprNode::Operator {
            op: Operator::Concat,
            args,
        } = model.expr(criterion)
        {
            if let [prefix, rest] = args.as_slice() {
                let rest = *rest;
                let comparison = match constant_of(model, *prefix) {
                    Some(Value::Text(prefix)) => COMPARISONS
                        .iter()
                        .find(|(symbol, _)| *symbol == prefix)
                        .map(|(_, op)| *op),
                    _ => None,
                };
                if let Some(op) = comparison {
                    return model.add_expr(ExprNode::op(op, vec![subject, rest]));
                }
            }
        }
        model.add_expr(ExprNode::op(Operator::Equal, vec![subject, criterion]))
    }

    /// Column of the rows of a database table that meet a criteria table
    ///
    /// Both tables carry labels in their first row. Criteria rows are alternatives; the
    /// non-blank cells of one row must all hold. A row without criteria selects everything.
    fn database(
        &mut self,
        model: &mut ComputationModel,
        call: ExprId,
        args: &[ExprId],
    ) -> CompilerResult<ExprId> {
        let unsupported = |model: &ComputationModel, reason: &str| {
            CompilerError::unsupported(model.describe_expr(call), reason.to_string())
        };
        let (table_chain, table) = unwrap_parents(model, arg(args, 0)?);
        let table = grid(model, call, table)?;
        let labels: Vec<Option<String>> = (0..table.cols)
            .map(|col| match table.at(0, col).and_then(|e| constant_of(model, e)) {
                Some(Value::Text(label)) => Some(label.to_lowercase()),
                _ => None,
            })
            .collect();
        let column = |label: &str| labels.iter().position(|l| l.as_deref() == Some(label));

        let field = match constant_of(model, arg(args, 1)?) {
            Some(Value::Text(label)) => column(&label.to_lowercase()),
            Some(Value::Number(n)) => {
                let n = n.to_f64();
                (n >= 1.0 && n <= f64::from(table.cols)).then(|| n as usize - 1)
            }
            _ => None,
        }
        .ok_or_else(|| unsupported(model, "the field names no column of the table"))?;

        let (criteria_chain, criteria) = unwrap_parents(model, arg(args, 2)?);
        let criteria = grid(model, call, criteria)?;
        let mut columns = Vec::with_capacity(criteria.cols as usize);
        for col in 0..criteria.cols {
            let target = match criteria.at(0, col).and_then(|e| constant_of(model, e)) {
                Some(Value::Text(label)) => column(&label.to_lowercase()),
                _ => None,
            };
            columns.push(target);
        }
        let mut alternatives = Vec::new();
        for row in 1..criteria.rows {
            let mut conditions = Vec::new();
            for (col, target) in columns.iter().enumerate() {
                let Some(cell) = criteria.at(row, col as u32) else {
                    continue;
                };
                let target = target
                    .ok_or_else(|| unsupported(model, "a criteria label names no column"))?;
                conditions.push((target, wrap_parents(model, &criteria_chain, cell)));
            }
            alternatives.push(conditions);
        }
        let select_all = alternatives.is_empty() || alternatives.iter().any(|c| c.is_empty());

        let noop = model.add_expr(ExprNode::op(Operator::Noop, Vec::new()));
        let mut entries = Vec::new();
        for row in 1..table.rows {
            let Some(value) = table.at(row, field as u32) else {
                continue;
            };
            let value = wrap_parents(model, &table_chain, value);
            if select_all {
                entries.push((u64::from(row - 1), value));
                continue;
            }
            let mut any = Vec::with_capacity(alternatives.len());
            for conditions in &alternatives {
                let mut all = Vec::with_capacity(conditions.len());
                for (col, criterion) in conditions {
                    let subject = match table.at(row, *col as u32) {
                        Some(cell) => wrap_parents(model, &table_chain, cell),
                        None => noop,
                    };
                    all.push(self.criterion(model, subject, *criterion));
                }
                any.push(join(model, Function::And, all));
            }
            let condition = join(model, Function::Or, any);
            let chosen = model.add_expr(ExprNode::Function {
                function: Function::If,
                args: vec![condition, value, noop],
            });
            entries.push((u64::from(row - 1), chosen));
        }
        let rows = table.rows.saturating_sub(1);
        Ok(model.add_expr(ExprNode::sparse_range(rows, 1, entries)))
    }

    // === Lookups ===

    /// `VLOOKUP(x, table, col[, sorted])` as `INDEX(table, MATCH(x, first column, type), col)`
    fn lookup(
        &mut self,
        model: &mut ComputationModel,
        call: ExprId,
        function: Function,
        args: &[ExprId],
    ) -> CompilerResult<ExprId> {
        self.fresh += 1;
        let table_arg = arg(args, 1)?;
        let (chain, table) = unwrap_parents(model, table_arg);
        let table = grid(model, call, table)?;
        let vertical = function == Function::VLookup;
        let keys: Vec<(u64, ExprId)> = table
            .entries
            .iter()
            .filter_map(|(offset, e)| {
                let (row, col) = (offset / u64::from(table.cols), offset % u64::from(table.cols));
                match (vertical, row, col) {
                    (true, row, 0) => Some((row, *e)),
                    (false, 0, col) => Some((col, *e)),
                    _ => None,
                }
            })
            .collect();
        let keys = if vertical {
            ExprNode::sparse_range(table.rows, 1, keys)
        } else {
            ExprNode::sparse_range(1, table.cols, keys)
        };
        let keys = model.add_expr(keys);
        let keys = wrap_parents(model, &chain, keys);

        let one = self.constant(model, self.numeric.one());
        let kind = match args.get(3) {
            Some(sorted) => {
                let zero = self.constant(model, self.numeric.zero());
                model.add_expr(ExprNode::Function {
                    function: Function::If,
                    args: vec![*sorted, one, zero],
                })
            }
            None => one,
        };
        let position = model.add_expr(ExprNode::Function {
            function: Function::Match,
            args: vec![arg(args, 0)?, keys, kind],
        });
        let index = arg(args, 2)?;
        let (row, col) = if vertical {
            (position, index)
        } else {
            (index, position)
        };
        Ok(model.add_expr(ExprNode::Function {
            function: Function::Index,
            args: vec![table_arg, row, col],
        }))
    }
}

fn arg(args: &[ExprId], position: usize) -> CompilerResult<ExprId> {
    args.get(position)
        .copied()
        .ok_or_else(|| CompilerError::internal(format!("missing argument {}", position + 1)))
}

/// Literal value of a node, seeing through references to cells that hold a constant
fn constant_of(model: &ComputationModel, id: ExprId) -> Option<Value> {
    match model.expr(id) {
        ExprNode::Constant(value) => Some(value.clone()),
        ExprNode::CellRef(cell) => {
            let cell = model.cell(*cell);
            match (cell.expression, cell.is_input()) {
                (None, false) => cell.constant.clone(),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Sections of the `ParentSection` wrappers around a node, outermost first, and the node inside
fn unwrap_parents(model: &ComputationModel, mut id: ExprId) -> (Vec<SectionId>, ExprId) {
    let mut chain = Vec::new();
    while let ExprNode::ParentSection { section, expr } = model.expr(id) {
        chain.push(*section);
        id = *expr;
    }
    (chain, id)
}

fn wrap_parents(model: &mut ComputationModel, chain: &[SectionId], mut id: ExprId) -> ExprId {
    for section in chain.iter().rev() {
        id = model.add_expr(ExprNode::ParentSection {
            section: *section,
            expr: id,
        });
    }
    id
}

/// Elements of a table operand; repeating sections have no fixed cell positions
fn grid(model: &ComputationModel, call: ExprId, id: ExprId) -> CompilerResult<Grid> {
    let grid = match model.expr(id) {
        ExprNode::Range {
            rows,
            cols,
            positions,
            elements,
        } => Grid {
            rows: *rows,
            cols: *cols,
            entries: positions.iter().copied().zip(elements.iter().copied()).collect(),
        },
        _ => Grid {
            rows: 1,
            cols: 1,
            entries: vec![(0, id)],
        },
    };
    let sectioned = grid
        .entries
        .iter()
        .any(|(_, e)| matches!(model.expr(*e), ExprNode::SubSection { .. }));
    if sectioned || matches!(model.expr(id), ExprNode::SubSection { .. }) {
        return Err(CompilerError::unsupported(
            model.describe_expr(call),
            "table over a repeating section",
        ));
    }
    Ok(grid)
}

fn join(model: &mut ComputationModel, function: Function, mut args: Vec<ExprId>) -> ExprId {
    if args.len() == 1 {
        if let Some(single) = args.pop() {
            return single;
        }
    }
    model.add_expr(ExprNode::Function { function, args })
}
