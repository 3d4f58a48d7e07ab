//! Static type annotation

use std::collections::{HashMap, HashSet};

use formcomp_formula::Function;
use tracing::{debug, debug_span};

use crate::error::{CompilerError, CompilerResult};
use crate::model::{CellId, ComputationModel, ExprId, ExprNode, Operator};
use crate::value::DataType;

/// Annotates every expression node and cell of a model with a [`DataType`]
///
/// Expression types are memoized per arena index, and per arena index and environment inside
/// `let` and fold bodies since a variable's type depends on its binding.
#[derive(Debug, Default)]
pub struct TypeAnnotator {
    cells: HashMap<CellId, DataType>,
    in_progress: HashSet<CellId>,
    scoped: HashMap<(ExprId, Env), DataType>,
}

type Env = Vec<(String, DataType)>;

impl TypeAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(&mut self, model: &mut ComputationModel) -> CompilerResult<()> {
        let span = debug_span!("annotate");
        let _enter = span.enter();

        self.cells.clear();
        self.in_progress.clear();
        self.scoped.clear();
        for id in model.cell_ids() {
            self.annotate_cell(model, id)
                .map_err(|e| e.in_cell(model.cell(id).name.clone()))?;
        }
        debug!(cells = self.cells.len(), "annotated model");
        Ok(())
    }

    fn annotate_cell(&mut self, model: &mut ComputationModel, id: CellId) -> CompilerResult<DataType> {
        if let Some(known) = self.cells.get(&id) {
            return Ok(*known);
        }
        if !self.in_progress.insert(id) {
            return Err(CompilerError::CyclicReference(model.cell(id).name.clone()));
        }

        let cell = model.cell(id);
        let constant = cell.constant.as_ref().map(|c| c.data_type());
        let data_type = match (cell.expression, constant, cell.input.is_some()) {
            (_, _, true) => cell.data_type.unwrap_or(DataType::Numeric),
            (Some(expr), _, false) => self.annotate_expr(model, expr, &mut Env::new())?,
            (None, Some(constant), false) => constant,
            (None, None, false) => DataType::Null,
        };

        self.in_progress.remove(&id);
        self.cells.insert(id, data_type);
        model.cell_mut(id).data_type = Some(data_type);
        Ok(data_type)
    }

    fn annotate_expr(
        &mut self,
        model: &mut ComputationModel,
        id: ExprId,
        env: &mut Env,
    ) -> CompilerResult<DataType> {
        if !matches!(model.expr(id), ExprNode::CellRef(_)) {
            let known = if env.is_empty() {
                model.exprs().data_type(id)
            } else {
                self.scoped.get(&(id, env.clone())).copied()
            };
            if let Some(known) = known {
                return Ok(known);
            }
        }

        let node = model.expr(id).clone();
        let data_type = match &node {
            ExprNode::Constant(value) => value.data_type(),
            ExprNode::CellRef(cell) => self.annotate_cell(model, *cell)?,
            ExprNode::Range { elements, .. } | ExprNode::SubSection { elements, .. } => {
                self.combine(model, elements, env)?
            }
            ExprNode::Aggregate { args, .. } => self.combine(model, args, env)?,
            ExprNode::Operator { op, args } => {
                self.each(model, args, env)?;
                match op {
                    Operator::Concat => DataType::String,
                    Operator::Noop => DataType::Null,
                    _ => DataType::Numeric,
                }
            }
            ExprNode::Function { function, args } => {
                let types = self.each(model, args, env)?;
                match function {
                    Function::If => match types.get(1) {
                        Some(then) => *then,
                        None => {
                            return Err(CompilerError::unsupported(
                                model.describe_expr(id),
                                "IF needs a condition and a value",
                            ))
                        }
                    },
                    Function::Index => types.first().copied().unwrap_or(DataType::Null),
                    Function::Choose => types.get(1).copied().unwrap_or(DataType::Null),
                    f if f.returns_text() => DataType::String,
                    _ => DataType::Numeric,
                }
            }
            ExprNode::Fold {
                acc,
                elt,
                seed,
                step,
                when_empty,
                source,
            } => {
                let seed_type = self.annotate_expr(model, *seed, env)?;
                self.each(model, source, env)?;
                if let Some(empty) = when_empty {
                    self.annotate_expr(model, *empty, env)?;
                }
                env.push((acc.clone(), seed_type));
                env.push((elt.clone(), DataType::Numeric));
                let step = self.annotate_expr(model, *step, env);
                env.truncate(env.len() - 2);
                step?;
                seed_type
            }
            ExprNode::Count { source } => {
                self.each(model, source, env)?;
                DataType::Numeric
            }
            ExprNode::Let { name, value, body } => {
                let value_type = self.annotate_expr(model, *value, env)?;
                env.push((name.clone(), value_type));
                let body_type = self.annotate_expr(model, *body, env);
                env.pop();
                body_type?
            }
            ExprNode::LetVar(name) => match env.iter().rev().find(|(n, _)| n == name) {
                Some((_, data_type)) => *data_type,
                None => {
                    return Err(CompilerError::unsupported(
                        name.clone(),
                        "variable used outside of its binding",
                    ))
                }
            },
            ExprNode::ParentSection { expr, .. } => self.annotate_expr(model, *expr, env)?,
        };

        if !env.is_empty() {
            self.scoped.insert((id, env.clone()), data_type);
        }
        model.exprs_mut().set_type(id, data_type);
        Ok(data_type)
    }

    fn each(
        &mut self,
        model: &mut ComputationModel,
        ids: &[ExprId],
        env: &mut Env,
    ) -> CompilerResult<Vec<DataType>> {
        ids.iter()
            .map(|id| self.annotate_expr(model, *id, env))
            .collect()
    }

    /// First numeric element wins, else the last string, else null
    fn combine(
        &mut self,
        model: &mut ComputationModel,
        ids: &[ExprId],
        env: &mut Env,
    ) -> CompilerResult<DataType> {
        let types = self.each(model, ids, env)?;
        if types.contains(&DataType::Numeric) {
            Ok(DataType::Numeric)
        } else if types.contains(&DataType::String) {
            Ok(DataType::String)
        } else {
            Ok(DataType::Null)
        }
    }
}

/// Check that every live cell and every node reachable from one carries a type
pub fn check_typed(model: &ComputationModel) -> CompilerResult<()> {
    for (_, cell) in model.cells() {
        if cell.data_type.is_none() {
            return Err(CompilerError::internal(format!("cell {} has no type", cell.name)));
        }
    }
    let roots = model.expression_roots();
    if let Some(id) = model
        .exprs()
        .post_order(roots)
        .into_iter()
        .find(|id| model.exprs().data_type(*id).is_none())
    {
        return Err(CompilerError::internal(format!(
            "expression {} ({}) has no type",
            id,
            model.describe_expr(id)
        )));
    }
    Ok(())
}
