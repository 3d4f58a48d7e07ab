//! Inlining intermediate cells

use std::collections::HashMap;

use tracing::{debug, debug_span, trace};

use crate::error::CompilerResult;
use crate::model::{CellId, ComputationModel, ExprId, ExprNode};

/// Substitutes cells read from exactly one place into their reader and drops unread cells
///
/// Inputs, outputs and cells calling a volatile function are kept. Runs until no cell changes.
#[derive(Debug, Default)]
pub struct IntermediateInliner {
    inlined: usize,
    removed: usize,
}

impl IntermediateInliner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cells taken out of the model
    pub fn inline(&mut self, model: &mut ComputationModel) -> CompilerResult<usize> {
        let span = debug_span!("inline");
        let _enter = span.enter();

        let mut round = 0;
        loop {
            round += 1;
            let references = reference_counts(model);
            let mut replacements = HashMap::new();
            let mut dead = Vec::new();
            for (id, cell) in model.cells() {
                if cell.is_input() || cell.is_output() || calls_volatile(model, id) {
                    continue;
                }
                match references.get(&id).copied().unwrap_or(0) {
                    0 => dead.push(id),
                    1 => {
                        replacements.insert(id, cell.expression);
                    }
                    _ => {}
                }
            }
            if replacements.is_empty() && dead.is_empty() {
                break;
            }
            debug!(
                round,
                inlined = replacements.len(),
                removed = dead.len(),
                "inlining intermediate cells"
            );

            let mut rewriter = Rewriter {
                replacements: &replacements,
                memo: HashMap::new(),
            };
            for id in model.cell_ids() {
                if replacements.contains_key(&id) || dead.contains(&id) {
                    continue;
                }
                if let Some(root) = model.cell(id).expression {
                    let rewritten = rewriter.rewrite(model, root);
                    model.cell_mut(id).expression = Some(rewritten);
                }
            }

            for id in replacements.keys().chain(dead.iter()) {
                trace!(cell = %model.cell(*id).name, "removed");
                model.remove_cell(*id);
            }
            self.inlined += replacements.len();
            self.removed += dead.len();
        }

        debug!(inlined = self.inlined, removed = self.removed, "inlined intermediates");
        Ok(self.inlined + self.removed)
    }
}

struct Rewriter<'r> {
    /// Cell → expression to put in place of its single reference; `None` for a literal cell
    replacements: &'r HashMap<CellId, Option<ExprId>>,
    memo: HashMap<ExprId, ExprId>,
}

impl Rewriter<'_> {
    fn rewrite(&mut self, model: &mut ComputationModel, id: ExprId) -> ExprId {
        if let Some(done) = self.memo.get(&id) {
            return *done;
        }
        let result = match model.expr(id) {
            ExprNode::CellRef(cell) if self.replacements.contains_key(cell) => {
                let cell = *cell;
                match self.replacements.get(&cell).copied().flatten() {
                    Some(expr) => self.rewrite(model, expr),
                    None => {
                        let target = model.cell(cell);
                        let value = target.constant.clone().unwrap_or_default();
                        let data_type = target.data_type;
                        model.exprs_mut().add_typed(ExprNode::Constant(value), data_type)
                    }
                }
            }
            node => {
                let children = node
                    .children()
                    .into_iter()
                    .map(|child| self.rewrite(model, child))
                    .collect();
                model.exprs_mut().rebuild(id, children)
            }
        };
        self.memo.insert(id, result);
        result
    }
}

/// Number of places each cell is read from, counting every path through shared subtrees
fn reference_counts(model: &ComputationModel) -> HashMap<CellId, usize> {
    let roots = model.expression_roots();
    let order = model.exprs().post_order(roots.iter().copied());

    let mut paths: HashMap<ExprId, usize> = HashMap::new();
    for root in &roots {
        *paths.entry(*root).or_default() += 1;
    }
    // post order lists children first, so walking it backwards sees every parent before its children
    for id in order.iter().rev() {
        let count = paths.get(id).copied().unwrap_or(0);
        for child in model.expr(*id).children() {
            let entry = paths.entry(child).or_default();
            *entry = entry.saturating_add(count);
        }
    }

    let mut references = HashMap::new();
    for id in order {
        if let ExprNode::CellRef(cell) = model.expr(id) {
            let entry = references.entry(*cell).or_insert(0usize);
            *entry = entry.saturating_add(paths.get(&id).copied().unwrap_or(0));
        }
    }
    references
}

fn calls_volatile(model: &ComputationModel, id: CellId) -> bool {
    let Some(root) = model.cell(id).expression else {
        return false;
    };
    model.exprs().post_order([root]).into_iter().any(|node| {
        matches!(model.expr(node), ExprNode::Function { function, .. } if function.is_volatile())
    })
}
