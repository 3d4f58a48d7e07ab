//! Formula AST to expression graph

use std::collections::BTreeSet;

use formcomp_core::{CellIndex, CellValue, RangeIndex, ReferenceStyle};
use formcomp_formula::{
    parse_formula_with, BinaryOperator, FormulaExpr, Function, ParseContext, UnaryOperator,
};

use super::SpreadsheetBinder;
use crate::error::{CompilerError, CompilerResult};
use crate::model::{ExprId, ExprNode, Operator, Orientation, SectionId};
use crate::value::Value;

/// Where a formula is being translated
#[derive(Debug, Clone, Copy)]
struct Scope {
    section: SectionId,
    sheet: usize,
}

fn binary_operator(op: BinaryOperator) -> Operator {
    match op {
        BinaryOperator::Add => Operator::Plus,
        BinaryOperator::Subtract => Operator::Minus,
        BinaryOperator::Multiply => Operator::Times,
        BinaryOperator::Divide => Operator::Divide,
        BinaryOperator::Power => Operator::Power,
        BinaryOperator::Equal => Operator::Equal,
        BinaryOperator::NotEqual => Operator::NotEqual,
        BinaryOperator::LessThan => Operator::Less,
        BinaryOperator::LessEqual => Operator::LessOrEqual,
        BinaryOperator::GreaterThan => Operator::Greater,
        BinaryOperator::GreaterEqual => Operator::GreaterOrEqual,
        BinaryOperator::Concat => Operator::Concat,
    }
}

fn intersect(a: &RangeIndex, b: &RangeIndex) -> RangeIndex {
    RangeIndex::new(
        a.sheet,
        a.first_row.max(b.first_row),
        a.first_col.max(b.first_col),
        a.last_row.min(b.last_row),
        a.last_col.min(b.last_col),
    )
}

impl<'s> SpreadsheetBinder<'s> {
    pub(super) fn translate_formula(
        &mut self,
        section: SectionId,
        index: CellIndex,
        text: &str,
        style: ReferenceStyle,
    ) -> CompilerResult<ExprId> {
        let context = ParseContext::new(index.address(), style);
        let ast = parse_formula_with(text, &context)?;
        let scope = Scope {
            section,
            sheet: index.sheet,
        };
        self.translate(scope, &ast, false)
    }

    /// Read a literal with the configured numeric type so no digits go through `f64`
    fn literal(&self, text: &str) -> CompilerResult<Value> {
        let number = match self.numeric.parse(text) {
            Ok(number) => number,
            Err(e) => match text.parse::<f64>() {
                Ok(value) => self.numeric.from_f64(value)?,
                Err(_) => return Err(e.into()),
            },
        };
        Ok(Value::Number(self.numeric.adjust_constant(number)))
    }

    fn number(&self, value: f64) -> CompilerResult<Value> {
        let number = self.numeric.from_f64(value)?;
        Ok(Value::Number(self.numeric.adjust_constant(number)))
    }

    fn translate(
        &mut self,
        scope: Scope,
        expr: &FormulaExpr,
        allow_range: bool,
    ) -> CompilerResult<ExprId> {
        let node = match expr {
            FormulaExpr::Number(text) => ExprNode::Constant(self.literal(text)?),
            FormulaExpr::String(s) => ExprNode::Constant(Value::Text(s.clone())),
            FormulaExpr::Boolean(b) => ExprNode::Constant(self.number(if *b { 1.0 } else { 0.0 })?),

            FormulaExpr::CellRef(r) => {
                let sheet = self.sheet_index(scope, r.sheet.as_deref())?;
                let range = RangeIndex::single(CellIndex::from_address(sheet, r.address));
                return self.reference(scope, range, allow_range, &expr.to_string());
            }
            FormulaExpr::RangeRef(r) => {
                if !allow_range {
                    return Err(CompilerError::unsupported(
                        expr.to_string(),
                        "range outside of an aggregate or lookup",
                    ));
                }
                let sheet = self.sheet_index(scope, r.sheet.as_deref())?;
                let range = RangeIndex::from_range(sheet, r.range);
                return self.reference(scope, range, allow_range, &expr.to_string());
            }
            FormulaExpr::NameRef(name) => {
                let range = self
                    .book
                    .resolve_name(name, scope.sheet)?
                    .ok_or_else(|| CompilerError::UnknownName(name.clone()))?;
                if !range.is_single_cell() && !allow_range {
                    return Err(CompilerError::unsupported(
                        name.clone(),
                        "range outside of an aggregate or lookup",
                    ));
                }
                return self.reference(scope, range, allow_range, name);
            }

            FormulaExpr::BinaryOp { op, left, right } => {
                let left = self.translate(scope, left, false)?;
                let right = self.translate(scope, right, false)?;
                ExprNode::op(binary_operator(*op), vec![left, right])
            }
            FormulaExpr::UnaryOp { op, operand } => {
                let operand = self.translate(scope, operand, false)?;
                let op = match op {
                    UnaryOperator::Negate => Operator::Negate,
                    UnaryOperator::Percent => Operator::Percent,
                };
                ExprNode::op(op, vec![operand])
            }

            FormulaExpr::Function { function, args } => {
                let args = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| self.translate(scope, arg, function.accepts_range(i)))
                    .collect::<CompilerResult<Vec<_>>>()?;
                let positional = matches!(
                    function,
                    Function::Index | Function::VLookup | Function::HLookup | Function::Match
                );
                if positional
                    && args
                        .iter()
                        .enumerate()
                        .any(|(i, a)| function.accepts_range(i) && self.spans_section(*a))
                {
                    return Err(CompilerError::unsupported(
                        expr.to_string(),
                        format!("{} over a repeating section", function),
                    ));
                }
                ExprNode::Function {
                    function: *function,
                    args,
                }
            }
            FormulaExpr::Aggregate { aggregator, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.translate(scope, arg, true))
                    .collect::<CompilerResult<Vec<_>>>()?;
                ExprNode::Aggregate {
                    aggregator: *aggregator,
                    args,
                }
            }
        };
        Ok(self.model.add_expr(node))
    }

    fn sheet_index(&self, scope: Scope, sheet: Option<&str>) -> CompilerResult<usize> {
        match sheet {
            None => Ok(scope.sheet),
            Some(name) => self
                .book
                .sheet_index(name)
                .ok_or_else(|| formcomp_core::Error::SheetNotFound(name.to_string()).into()),
        }
    }

    /// Whether the node, seen through parent wrappers, iterates a repeating section
    fn spans_section(&self, id: ExprId) -> bool {
        match self.model.expr(id) {
            ExprNode::SubSection { .. } => true,
            ExprNode::ParentSection { expr, .. } => self.spans_section(*expr),
            ExprNode::Range { elements, .. } => elements
                .iter()
                .any(|e| matches!(self.model.expr(*e), ExprNode::SubSection { .. })),
            _ => false,
        }
    }

    /// Translate a cell or range reference made from `scope`
    ///
    /// The reference is resolved in the innermost section enclosing both the referencing cell
    /// and the referenced range, then wrapped so it evaluates in that section's frame.
    fn reference(
        &mut self,
        scope: Scope,
        range: RangeIndex,
        allow_range: bool,
        text: &str,
    ) -> CompilerResult<ExprId> {
        let owner = self.owner(&range);
        let home = self.model.common_ancestor(scope.section, owner);
        let entries = self.elements_in(range, home, text)?;

        let has_sections = entries
            .iter()
            .any(|(_, e)| matches!(self.model.expr(*e), ExprNode::SubSection { .. }));
        if has_sections && !allow_range {
            return Err(CompilerError::InvalidReference {
                reference: text.to_string(),
                reason: "repeating section referenced outside of an aggregate".to_string(),
            });
        }

        let mut id = match entries.as_slice() {
            [] if range.is_single_cell() => {
                self.model.add_expr(ExprNode::op(Operator::Noop, Vec::new()))
            }
            [(_, single)] if range.is_single_cell() || has_sections => *single,
            _ if has_sections => {
                let elements: Vec<ExprId> = entries.into_iter().map(|(_, e)| e).collect();
                self.model
                    .add_expr(ExprNode::range(1, elements.len() as u32, elements))
            }
            _ => self.model.add_expr(ExprNode::sparse_range(
                range.row_count(),
                u32::from(range.col_count()),
                entries,
            )),
        };

        let mut chain = Vec::new();
        let mut current = scope.section;
        while current != home {
            chain.push(current);
            current = self.model.section(current).parent.unwrap_or(SectionId::ROOT);
        }
        for section in chain.into_iter().rev() {
            id = self.model.add_expr(ExprNode::ParentSection { section, expr: id });
        }
        Ok(id)
    }

    /// Non-blank elements of `range` as seen from the frame of `home`, keyed by row-major offset
    ///
    /// Only stored and bound cells are visited, so blank stretches of a range cost nothing.
    /// Child sections overlapped by the range become one `SubSection` element each, placed at
    /// their first cell; the range must cover such a section's full extent in its direction of
    /// repetition.
    fn elements_in(
        &mut self,
        range: RangeIndex,
        home: SectionId,
        text: &str,
    ) -> CompilerResult<Vec<(u64, ExprId)>> {
        let children: Vec<(SectionId, RangeIndex)> = self
            .model
            .section(home)
            .children
            .iter()
            .filter_map(|c| self.model.section(*c).range.map(|r| (*c, r)))
            .filter(|(_, r)| r.overlaps(&range))
            .collect();

        let width = u64::from(range.col_count());
        let offset = |cell: CellIndex| {
            u64::from(cell.row - range.first_row) * width + u64::from(cell.col - range.first_col)
        };

        let mut entries = Vec::new();
        for (section, extent) in &children {
            let first = intersect(&range, extent).top_left();
            let sub = self.sub_section(range, *section, text)?;
            entries.push((offset(first), sub));
        }

        let mut cells: BTreeSet<CellIndex> = self.book.cells_in(range).collect();
        cells.extend(self.cells.keys().copied().filter(|c| range.contains(*c)));
        for cell in cells {
            if children.iter().any(|(_, extent)| extent.contains(cell)) {
                continue;
            }
            let element = self.cell_ref(home, cell)?;
            entries.push((offset(cell), element));
        }
        entries.sort_by_key(|(position, _)| *position);
        Ok(entries)
    }

    fn sub_section(
        &mut self,
        range: RangeIndex,
        section: SectionId,
        text: &str,
    ) -> CompilerResult<ExprId> {
        let model = self.model.section(section);
        let (Some(extent), Some(template)) = (model.range, model.template) else {
            return Err(CompilerError::internal("repeating section without a range"));
        };
        let covered = match model.orientation {
            Orientation::Vertical => {
                range.first_row <= extent.first_row && range.last_row >= extent.last_row
            }
            Orientation::Horizontal => {
                range.first_col <= extent.first_col && range.last_col >= extent.last_col
            }
        };
        if !covered {
            return Err(CompilerError::InvalidReference {
                reference: text.to_string(),
                reason: format!("range partially covers section {} ({})", model.name, extent),
            });
        }

        let piece = intersect(&range, &template);
        let elements = self
            .elements_in(piece, section, text)?
            .into_iter()
            .map(|(_, e)| e)
            .collect();
        Ok(self.model.add_expr(ExprNode::SubSection { section, elements }))
    }

    fn cell_ref(&mut self, section: SectionId, index: CellIndex) -> CompilerResult<ExprId> {
        if let Some(id) = self.cells.get(&index) {
            return Ok(self.model.add_expr(ExprNode::CellRef(*id)));
        }
        match self.book.cell(index) {
            None | Some(CellValue::Empty) => {
                Ok(self.model.add_expr(ExprNode::op(Operator::Noop, Vec::new())))
            }
            Some(_) => {
                let id = self.cell_for(section, index)?;
                Ok(self.model.add_expr(ExprNode::CellRef(id)))
            }
        }
    }
}
