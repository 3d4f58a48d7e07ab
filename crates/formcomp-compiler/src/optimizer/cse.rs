//! Constant folding and sharing of identical subexpressions

use std::collections::HashMap;

use ahash::AHashMap;
use formcomp_formula::Function;
use tracing::{debug, debug_span, trace};

use crate::engine::{Env, Interpreter, NoFrame};
use crate::error::CompilerResult;
use crate::model::{CellId, ComputationModel, ExprId, ExprNode, Operator};
use crate::numeric::NumericType;
use crate::value::{DataType, Value};

type InternKey = (ExprNode, Option<DataType>);

/// Folds constant subtrees with the configured numeric type and hash-conses the rest
///
/// A subtree is constant when it reads no input, no cell that is not itself constant, no
/// section, and no volatile function. Folding is skipped when evaluation fails or the result's
/// type differs from the node's annotated type.
pub struct ConstantEliminator<'a> {
    numeric: &'a dyn NumericType,
    memo: HashMap<ExprId, ExprId>,
    interned: AHashMap<InternKey, ExprId>,
    /// Whether an interned node depends only on literals
    pure: HashMap<ExprId, bool>,
    folded: usize,
    shared: usize,
}

impl<'a> ConstantEliminator<'a> {
    pub fn new(numeric: &'a dyn NumericType) -> Self {
        Self {
            numeric,
            memo: HashMap::new(),
            interned: AHashMap::new(),
            pure: HashMap::new(),
            folded: 0,
            shared: 0,
        }
    }

    /// Returns the number of nodes folded into constants
    pub fn eliminate(&mut self, model: &mut ComputationModel) -> CompilerResult<usize> {
        let span = debug_span!("cse");
        let _enter = span.enter();

        for id in model.cell_ids() {
            let Some(root) = model.cell(id).expression else {
                continue;
            };
            let reduced = self.process(model, root);
            if reduced != root {
                trace!(cell = %model.cell(id).name, "simplified");
                model.cell_mut(id).expression = Some(reduced);
            }
        }
        debug!(
            folded = self.folded,
            shared = self.shared,
            "eliminated constant subexpressions"
        );
        Ok(self.folded)
    }

    fn process(&mut self, model: &mut ComputationModel, id: ExprId) -> ExprId {
        if let Some(done) = self.memo.get(&id) {
            return *done;
        }
        let data_type = model.exprs().data_type(id);
        let node = model.expr(id).clone();

        let result = match node {
            ExprNode::CellRef(cell) => match self.cell_constant(model, cell) {
                Some(value) => {
                    self.folded += 1;
                    self.intern(model, ExprNode::Constant(value), data_type)
                }
                None => self.intern(model, node, data_type),
            },
            node => {
                let children = node
                    .children()
                    .into_iter()
                    .map(|child| self.process(model, child))
                    .collect();
                let rebuilt = node.with_children(children);
                match self.choose_branch(model, &rebuilt, data_type) {
                    Some(branch) => branch,
                    None => {
                        let interned = self.intern(model, rebuilt, data_type);
                        self.fold(model, interned, data_type).unwrap_or(interned)
                    }
                }
            }
        };
        self.memo.insert(id, result);
        result
    }

    /// Value of a non-input cell whose content reduces to a literal
    fn cell_constant(&mut self, model: &mut ComputationModel, id: CellId) -> Option<Value> {
        let cell = model.cell(id);
        if cell.is_input() {
            return None;
        }
        let Some(expr) = cell.expression else {
            return cell.constant.clone();
        };
        let reduced = self.process(model, expr);
        model.expr(reduced).as_constant().cloned()
    }

    /// `IF` whose condition is a literal, replaced by the branch taken
    fn choose_branch(
        &self,
        model: &ComputationModel,
        node: &ExprNode,
        data_type: Option<DataType>,
    ) -> Option<ExprId> {
        let ExprNode::Function {
            function: Function::If,
            args,
        } = node
        else {
            return None;
        };
        let condition = model.expr(*args.first()?).as_constant()?;
        let interpreter = Interpreter::new(model.exprs(), self.numeric);
        let taken = if interpreter.truth(condition).ok()? {
            *args.get(1)?
        } else {
            *args.get(2)?
        };
        (model.exprs().data_type(taken) == data_type).then_some(taken)
    }

    fn fold(
        &mut self,
        model: &mut ComputationModel,
        id: ExprId,
        data_type: Option<DataType>,
    ) -> Option<ExprId> {
        let foldable = matches!(
            model.expr(id),
            ExprNode::Operator { op, .. } if *op != Operator::Noop
        ) || matches!(
            model.expr(id),
            ExprNode::Function { .. } | ExprNode::Fold { .. } | ExprNode::Count { .. } | ExprNode::Let { .. }
        );
        if !foldable || !self.pure.get(&id).copied().unwrap_or(false) {
            return None;
        }

        let interpreter = Interpreter::new(model.exprs(), self.numeric);
        let value = match interpreter.eval(&NoFrame, id, &mut Env::new()) {
            Ok(value) => value,
            Err(e) => {
                trace!(expr = %model.describe_expr(id), error = %e, "not folded");
                return None;
            }
        };
        let value = match value {
            Value::Number(n) => {
                if !self.numeric.is_finite(&n) {
                    return None;
                }
                let n = self.numeric.convert(&n).ok()?;
                Value::Number(self.numeric.adjust_constant(n))
            }
            other => other,
        };
        if Some(value.data_type()) != data_type {
            return None;
        }

        self.folded += 1;
        Some(self.intern(model, ExprNode::Constant(value), data_type))
    }

    /// Shared id for structurally identical nodes; commutative operands compare as a multiset
    fn intern(
        &mut self,
        model: &mut ComputationModel,
        node: ExprNode,
        data_type: Option<DataType>,
    ) -> ExprId {
        let key = match &node {
            ExprNode::Operator { op, args } if op.is_commutative() => {
                let mut sorted = args.clone();
                sorted.sort();
                ExprNode::op(*op, sorted)
            }
            _ => node.clone(),
        };
        if let Some(existing) = self.interned.get(&(key.clone(), data_type)) {
            self.shared += 1;
            return *existing;
        }

        let pure = match &node {
            ExprNode::CellRef(_) | ExprNode::ParentSection { .. } | ExprNode::SubSection { .. } => {
                false
            }
            ExprNode::Function { function, .. } if function.is_volatile() => false,
            node => node
                .children()
                .iter()
                .all(|child| self.pure.get(child).copied().unwrap_or(false)),
        };
        let id = model.exprs_mut().add_typed(node, data_type);
        self.pure.insert(id, pure);
        self.interned.insert((key, data_type), id);
        id
    }
}
