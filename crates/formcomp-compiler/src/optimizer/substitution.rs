//! Resolving `let` bindings

use std::collections::{HashMap, HashSet};

use tracing::{debug, debug_span};

use crate::error::{CompilerError, CompilerResult};
use crate::model::{ComputationModel, ExprId, ExprNode};

/// Bound names in scope; `None` marks a fold variable that shadows an outer binding
type Scope = Vec<(String, Option<ExprId>)>;

/// Replaces every `let` with its body, substituting the bound expression at each use
///
/// Fold accumulators and element variables stay as variables. A binding read inside a fold
/// step stays a `let` unless its value is a leaf, so the value is computed once rather than once
/// per folded element. Nodes are rebuilt copy-on-write, so subtrees shared with other cells are
/// never changed underneath them.
#[derive(Debug, Default)]
pub struct SubstitutionInliner {
    memo: HashMap<ExprId, ExprId>,
    substituted: usize,
}

impl SubstitutionInliner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bindings resolved
    pub fn substitute(&mut self, model: &mut ComputationModel) -> CompilerResult<usize> {
        let span = debug_span!("substitute");
        let _enter = span.enter();

        self.memo.clear();
        self.substituted = 0;
        for id in model.cell_ids() {
            let Some(root) = model.cell(id).expression else {
                continue;
            };
            let resolved = self
                .resolve(model, root, &mut Scope::new())
                .map_err(|e| e.in_cell(model.cell(id).name.clone()))?;
            model.cell_mut(id).expression = Some(resolved);
        }
        debug!(bindings = self.substituted, "resolved let bindings");
        Ok(self.substituted)
    }

    fn resolve(
        &mut self,
        model: &mut ComputationModel,
        id: ExprId,
        scope: &mut Scope,
    ) -> CompilerResult<ExprId> {
        if scope.is_empty() {
            if let Some(done) = self.memo.get(&id) {
                return Ok(*done);
            }
        }

        let result = match model.expr(id).clone() {
            ExprNode::Let { name, value, body } => {
                let value = self.resolve(model, value, scope)?;
                if !is_leaf(model.expr(value)) && read_in_fold_step(model, body, &name) {
                    scope.push((name, None));
                    let body = self.resolve(model, body, scope);
                    scope.pop();
                    model.exprs_mut().rebuild(id, vec![value, body?])
                } else {
                    scope.push((name, Some(value)));
                    let body = self.resolve(model, body, scope);
                    scope.pop();
                    self.substituted += 1;
                    body?
                }
            }
            ExprNode::LetVar(name) => match scope.iter().rev().find(|(n, _)| *n == name) {
                Some((_, Some(value))) => *value,
                Some((_, None)) => id,
                None => {
                    return Err(CompilerError::internal(format!(
                        "variable {} is not bound",
                        name
                    )))
                }
            },
            ExprNode::Fold {
                acc,
                elt,
                seed,
                step,
                when_empty,
                source,
            } => {
                let seed = self.resolve(model, seed, scope)?;
                let when_empty = when_empty
                    .map(|e| self.resolve(model, e, scope))
                    .transpose()?;
                let source = source
                    .into_iter()
                    .map(|s| self.resolve(model, s, scope))
                    .collect::<CompilerResult<Vec<_>>>()?;
                scope.push((acc, None));
                scope.push((elt, None));
                let step = self.resolve(model, step, scope);
                scope.truncate(scope.len() - 2);

                let mut children = vec![seed, step?];
                children.extend(when_empty);
                children.extend(source);
                model.exprs_mut().rebuild(id, children)
            }
            node => {
                let children = node
                    .children()
                    .into_iter()
                    .map(|child| self.resolve(model, child, scope))
                    .collect::<CompilerResult<Vec<_>>>()?;
                model.exprs_mut().rebuild(id, children)
            }
        };

        if scope.is_empty() {
            self.memo.insert(id, result);
        }
        Ok(result)
    }
}

fn is_leaf(node: &ExprNode) -> bool {
    matches!(
        node,
        ExprNode::Constant(_) | ExprNode::CellRef(_) | ExprNode::LetVar(_)
    ) || matches!(node, ExprNode::Operator { args, .. } if args.is_empty())
}

/// Whether `name`, as bound just outside `root`, is read from the step of a fold in `root`
fn read_in_fold_step(model: &ComputationModel, root: ExprId, name: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![(root, false)];
    while let Some((id, in_step)) = stack.pop() {
        if !visited.insert((id, in_step)) {
            continue;
        }
        match model.expr(id) {
            ExprNode::LetVar(var) if var == name => {
                if in_step {
                    return true;
                }
            }
            ExprNode::Let {
                name: bound,
                value,
                body,
            } => {
                stack.push((*value, in_step));
                if bound != name {
                    stack.push((*body, in_step));
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
                stack.push((*seed, in_step));
                stack.extend(when_empty.iter().map(|e| (*e, in_step)));
                stack.extend(source.iter().map(|s| (*s, in_step)));
                if acc != name && elt != name {
                    stack.push((*step, true));
                }
            }
            node => stack.extend(node.children().into_iter().map(|c| (c, in_step))),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operator;
    use crate::shape::Shape;
    use formcomp_core::CellIndex;
    use pretty_assertions::assert_eq;

    fn model_with(build: impl FnOnce(&mut ComputationModel) -> ExprId) -> (ComputationModel, crate::model::CellId) {
        let mut model = ComputationModel::new(Shape::new(), Shape::new());
        let cell = model.add_cell(model.root(), "A1", CellIndex::new(0, 0, 0));
        let root = build(&mut model);
        model.cell_mut(cell).expression = Some(root);
        (model, cell)
    }

    fn substituted(model: &mut ComputationModel, cell: crate::model::CellId) -> String {
        SubstitutionInliner::new().substitute(model).unwrap();
        model.describe_expr(model.cell(cell).expression.unwrap())
    }

    #[test]
    fn test_let_is_substituted() {
        let (mut model, cell) = model_with(|model| {
            let two = model.add_expr(ExprNode::constant(2.0));
            let x = model.add_expr(ExprNode::LetVar("x".into()));
            let body = model.add_expr(ExprNode::op(Operator::Times, vec![x, x]));
            model.add_expr(ExprNode::Let {
                name: "x".into(),
                value: two,
                body,
            })
        });
        assert_eq!(substituted(&mut model, cell), "(2 * 2)");
    }

    #[test]
    fn test_inner_binding_shadows() {
        let (mut model, cell) = model_with(|model| {
            let one = model.add_expr(ExprNode::constant(1.0));
            let two = model.add_expr(ExprNode::constant(2.0));
            let x = model.add_expr(ExprNode::LetVar("x".into()));
            let inner = model.add_expr(ExprNode::Let {
                name: "x".into(),
                value: two,
                body: x,
            });
            let body = model.add_expr(ExprNode::op(Operator::Plus, vec![x, inner]));
            model.add_expr(ExprNode::Let {
                name: "x".into(),
                value: one,
                body,
            })
        });
        assert_eq!(substituted(&mut model, cell), "(1 + 2)");
    }

    #[test]
    fn test_fold_variables_shadow_outer_bindings() {
        let (mut model, cell) = model_with(|model| {
            let zero = model.add_expr(ExprNode::constant(0.0));
            let three = model.add_expr(ExprNode::constant(3.0));
            let acc = model.add_expr(ExprNode::LetVar("acc".into()));
            let x = model.add_expr(ExprNode::LetVar("x".into()));
            let step = model.add_expr(ExprNode::op(Operator::Plus, vec![acc, x]));
            let fold = model.add_expr(ExprNode::Fold {
                acc: "acc".into(),
                elt: "x".into(),
                seed: zero,
                step,
                when_empty: None,
                source: vec![x],
            });
            model.add_expr(ExprNode::Let {
                name: "x".into(),
                value: three,
                body: fold,
            })
        });
        assert_eq!(
            substituted(&mut model, cell),
            "fold(acc = 0, x: (acc + x) over 3)"
        );
    }

    #[test]
    fn test_unbound_variable_is_internal_error() {
        let (mut model, _) = model_with(|model| model.add_expr(ExprNode::LetVar("y".into())));
        let err = SubstitutionInliner::new().substitute(&mut model).unwrap_err();
        assert!(matches!(err.root_cause(), CompilerError::Internal(_)));
    }

    #[test]
    fn test_shared_nodes_are_not_mutated() {
        let mut model = ComputationModel::new(Shape::new(), Shape::new());
        let a = model.add_cell(model.root(), "A1", CellIndex::new(0, 0, 0));
        let b = model.add_cell(model.root(), "B1", CellIndex::new(0, 0, 1));
        let x = model.add_expr(ExprNode::LetVar("x".into()));
        let one = model.add_expr(ExprNode::constant(1.0));
        let shared = model.add_expr(ExprNode::op(Operator::Negate, vec![one]));
        let body = model.add_expr(ExprNode::op(Operator::Plus, vec![x, shared]));
        let bound = model.add_expr(ExprNode::Let {
            name: "x".into(),
            value: one,
            body,
        });
        model.cell_mut(a).expression = Some(bound);
        model.cell_mut(b).expression = Some(shared);

        SubstitutionInliner::new().substitute(&mut model).unwrap();
        assert_eq!(model.describe_expr(model.cell(a).expression.unwrap()), "(1 + -1)");
        assert_eq!(model.cell(b).expression, Some(shared));
        assert_eq!(model.expr(body), &ExprNode::op(Operator::Plus, vec![x, shared]));
    }

    #[test]
    fn test_binding_read_per_element_stays_bound() {
        let (mut model, cell) = model_with(|model| {
            let zero = model.add_expr(ExprNode::constant(0.0));
            let five = model.add_expr(ExprNode::constant(5.0));
            let seven = model.add_expr(ExprNode::constant(7.0));
            let offset = model.add_expr(ExprNode::op(Operator::Times, vec![five, seven]));
            let acc = model.add_expr(ExprNode::LetVar("acc".into()));
            let x = model.add_expr(ExprNode::LetVar("x".into()));
            let m = model.add_expr(ExprNode::LetVar("m".into()));
            let diff = model.add_expr(ExprNode::op(Operator::Minus, vec![x, m]));
            let step = model.add_expr(ExprNode::op(Operator::Plus, vec![acc, diff]));
            let fold = model.add_expr(ExprNode::Fold {
                acc: "acc".into(),
                elt: "x".into(),
                seed: zero,
                step,
                when_empty: None,
                source: vec![five, seven],
            });
            let body = model.add_expr(ExprNode::op(Operator::Divide, vec![fold, m]));
            model.add_expr(ExprNode::Let {
                name: "m".into(),
                value: offset,
                body,
            })
        });
        assert_eq!(
            substituted(&mut model, cell),
            "(let m = (5 * 7) in (fold(acc = 0, x: (acc + (x - m)) over 5, 7) / m))"
        );
    }

    #[test]
    fn test_leaf_bindings_are_substituted_into_steps() {
        let (mut model, cell) = model_with(|model| {
            let zero = model.add_expr(ExprNode::constant(0.0));
            let two = model.add_expr(ExprNode::constant(2.0));
            let acc = model.add_expr(ExprNode::LetVar("acc".into()));
            let k = model.add_expr(ExprNode::LetVar("k".into()));
            let step = model.add_expr(ExprNode::op(Operator::Plus, vec![acc, k]));
            let fold = model.add_expr(ExprNode::Fold {
                acc: "acc".into(),
                elt: "x".into(),
                seed: zero,
                step,
                when_empty: None,
                source: vec![two],
            });
            model.add_expr(ExprNode::Let {
                name: "k".into(),
                value: two,
                body: fold,
            })
        });
        assert_eq!(
            substituted(&mut model, cell),
            "fold(acc = 0, x: (acc + 2) over 2)"
        );
    }
}
