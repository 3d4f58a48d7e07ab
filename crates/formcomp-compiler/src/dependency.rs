//! Dependency tracking between bound cells

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::model::{CellId, ComputationModel, ExprNode};

/// Which cells read which other cells
///
/// Built from a bound model; used to reject circular references before any pass runs.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: BTreeMap<CellId, BTreeSet<CellId>>,
    /// Cell → Cells it depends on (precedents)
    precedents: BTreeMap<CellId, BTreeSet<CellId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the cell references of every live cell's expression
    pub fn from_model(model: &ComputationModel) -> Self {
        let mut graph = Self::new();
        for (id, cell) in model.cells() {
            graph.precedents.entry(id).or_default();
            let Some(root) = cell.expression else {
                continue;
            };
            for node in model.exprs().post_order([root]) {
                if let ExprNode::CellRef(target) = model.expr(node) {
                    graph.add_dependency(*target, id);
                }
            }
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellId, dependent: CellId) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Get cells that depend on the given cell
    pub fn get_dependents(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells ordered so every cell comes after its precedents
    ///
    /// Fails with a cell on a cycle if the graph is not acyclic.
    pub fn evaluation_order(&self) -> Result<Vec<CellId>, CellId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut in_stack = HashSet::new();

        for &cell in self.precedents.keys() {
            self.visit(cell, &mut result, &mut visited, &mut in_stack)?;
        }
        Ok(result)
    }

    fn visit(
        &self,
        cell: CellId,
        result: &mut Vec<CellId>,
        visited: &mut HashSet<CellId>,
        in_stack: &mut HashSet<CellId>,
    ) -> Result<(), CellId> {
        if visited.contains(&cell) {
            return Ok(());
        }
        if !in_stack.insert(cell) {
            return Err(cell);
        }

        for precedent in self.get_precedents(cell) {
            self.visit(precedent, result, visited, in_stack)?;
        }

        in_stack.remove(&cell);
        visited.insert(cell);
        result.push(cell);
        Ok(())
    }

    /// Detect circular references involving a cell
    pub fn has_circular_reference(&self, cell: CellId) -> bool {
        let mut visited = HashSet::new();
        let mut in_stack = HashSet::new();
        self.detect_cycle(cell, &mut visited, &mut in_stack)
    }

    fn detect_cycle(
        &self,
        cell: CellId,
        visited: &mut HashSet<CellId>,
        in_stack: &mut HashSet<CellId>,
    ) -> bool {
        if in_stack.contains(&cell) {
            return true;
        }
        if visited.contains(&cell) {
            return false;
        }

        visited.insert(cell);
        in_stack.insert(cell);

        for precedent in self.get_precedents(cell) {
            if self.detect_cycle(precedent, visited, in_stack) {
                return true;
            }
        }

        in_stack.remove(&cell);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use formcomp_core::CellIndex;

    fn cells(count: u16) -> (ComputationModel, Vec<CellId>) {
        let mut model = ComputationModel::new(Shape::new(), Shape::new());
        let ids = (0..count)
            .map(|col| model.add_cell(model.root(), format!("C{}", col), CellIndex::new(0, 0, col)))
            .collect();
        (model, ids)
    }

    #[test]
    fn test_add_dependency() {
        let (_, ids) = cells(2);
        let mut graph = DependencyGraph::new();
        graph.add_dependency(ids[0], ids[1]);

        assert!(graph.get_dependents(ids[0]).any(|c| c == ids[1]));
        assert!(graph.get_precedents(ids[1]).any(|c| c == ids[0]));
    }

    #[test]
    fn test_evaluation_order() {
        let (mut model, ids) = cells(3);
        let a = model.add_expr(ExprNode::CellRef(ids[0]));
        let b = model.add_expr(ExprNode::CellRef(ids[1]));
        model.cell_mut(ids[1]).expression = Some(a);
        model.cell_mut(ids[2]).expression = Some(b);

        let graph = DependencyGraph::from_model(&model);
        assert_eq!(graph.evaluation_order(), Ok(ids.clone()));
        assert!(!graph.has_circular_reference(ids[2]));
    }

    #[test]
    fn test_circular_reference() {
        let (_, ids) = cells(3);
        let mut graph = DependencyGraph::new();

        // C0 -> C1 -> C2 -> C0
        graph.add_dependency(ids[0], ids[1]);
        graph.add_dependency(ids[1], ids[2]);
        graph.add_dependency(ids[2], ids[0]);

        assert!(graph.has_circular_reference(ids[0]));
        assert!(graph.has_circular_reference(ids[2]));
        assert!(graph.evaluation_order().is_err());
    }
}
