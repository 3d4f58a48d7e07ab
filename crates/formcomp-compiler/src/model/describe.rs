//! Textual rendering of a model for diagnostics and tests

use std::fmt::Write;

use super::{ComputationModel, ExprId, ExprNode, Operator, SectionId};

impl ComputationModel {
    /// Render one expression, e.g. `(A1 + 2)` or `items~>B3`
    pub fn describe_expr(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.write_expr(&mut out, id);
        out
    }

    /// Render every section and live cell, one cell per line
    ///
    /// ```text
    /// root
    ///   A1 : numeric <- a
    ///   B1 = (A1 + 2) : numeric -> result
    /// ```
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.write_section(&mut out, self.root(), 0);
        out
    }

    fn write_section(&self, out: &mut String, id: SectionId, depth: usize) {
        let section = self.section(id);
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push_str(&section.name);
        if let Some(range) = section.range {
            let _ = write!(out, " [{} {}]", range, section.orientation);
        }
        if let Some(input) = &section.input_slot {
            let _ = write!(out, " <- {}", input);
        }
        if let Some(output) = &section.output_slot {
            let _ = write!(out, " -> {}", output);
        }
        out.push('\n');

        for &cell_id in &section.cells {
            let cell = self.cell(cell_id);
            let _ = write!(out, "{}  {}", indent, cell.name);
            if let Some(expr) = cell.expression {
                let _ = write!(out, " = {}", self.describe_expr(expr));
            } else if let Some(constant) = &cell.constant {
                let _ = write!(out, " = {}", constant);
            }
            if let Some(data_type) = cell.data_type {
                let _ = write!(out, " : {}", data_type);
            }
            if let Some(input) = &cell.input {
                let _ = write!(out, " <- {}", input);
            }
            if !cell.outputs.is_empty() {
                let _ = write!(out, " -> {}", cell.outputs.join(", "));
            }
            out.push('\n');
        }

        for &child in &section.children {
            self.write_section(out, child, depth + 1);
        }
    }

    fn write_list(&self, out: &mut String, ids: &[ExprId]) {
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(out, *id);
        }
    }

    fn write_expr(&self, out: &mut String, id: ExprId) {
        match self.expr(id) {
            ExprNode::Constant(value) => {
                let _ = write!(out, "{}", value);
            }
            ExprNode::CellRef(cell) => out.push_str(&self.cell(*cell).name),
            ExprNode::Range {
                rows,
                cols,
                positions,
                elements,
            } if positions.len() as u64 == u64::from(*rows) * u64::from(*cols) => {
                out.push('{');
                let cols = (*cols).max(1) as usize;
                for (row, chunk) in elements.chunks(cols).enumerate() {
                    if row > 0 {
                        out.push_str("; ");
                    }
                    self.write_list(out, chunk);
                }
                out.push('}');
            }
            ExprNode::Range {
                rows,
                cols,
                positions,
                elements,
            } => {
                let _ = write!(out, "{{[{}x{}]", rows, cols);
                let width = u64::from((*cols).max(1));
                for (i, (offset, element)) in positions.iter().zip(elements).enumerate() {
                    let sep = if i > 0 { ", " } else { " " };
                    let _ = write!(out, "{}R{}C{}: ", sep, offset / width + 1, offset % width + 1);
                    self.write_expr(out, *element);
                }
                out.push('}');
            }
            ExprNode::Operator { op, args } => match (op, args.as_slice()) {
                (Operator::Noop, _) => out.push_str("noop"),
                (Operator::Negate, [operand]) => {
                    out.push('-');
                    self.write_expr(out, *operand);
                }
                (Operator::Percent, [operand]) => {
                    self.write_expr(out, *operand);
                    out.push('%');
                }
                (Operator::Min | Operator::Max, _) => {
                    let _ = write!(out, "{}(", op.symbol());
                    self.write_list(out, args);
                    out.push(')');
                }
                (_, [left, right]) => {
                    out.push('(');
                    self.write_expr(out, *left);
                    let _ = write!(out, " {} ", op.symbol());
                    self.write_expr(out, *right);
                    out.push(')');
                }
                _ => {
                    let _ = write!(out, "{}(", op.symbol());
                    self.write_list(out, args);
                    out.push(')');
                }
            },
            ExprNode::Function { function, args } => {
                let _ = write!(out, "{}(", function);
                self.write_list(out, args);
                out.push(')');
            }
            ExprNode::Aggregate { aggregator, args } => {
                let _ = write!(out, "{}(", aggregator);
                self.write_list(out, args);
                out.push(')');
            }
            ExprNode::Fold {
                acc,
                elt,
                seed,
                step,
                when_empty,
                source,
            } => {
                let _ = write!(out, "fold({} = ", acc);
                self.write_expr(out, *seed);
                let _ = write!(out, ", {}: ", elt);
                self.write_expr(out, *step);
                out.push_str(" over ");
                self.write_list(out, source);
                if let Some(empty) = when_empty {
                    out.push_str(" else ");
                    self.write_expr(out, *empty);
                }
                out.push(')');
            }
            ExprNode::Count { source } => {
                out.push_str("count(");
                self.write_list(out, source);
                out.push(')');
            }
            ExprNode::Let { name, value, body } => {
                let _ = write!(out, "(let {} = ", name);
                self.write_expr(out, *value);
                out.push_str(" in ");
                self.write_expr(out, *body);
                out.push(')');
            }
            ExprNode::LetVar(name) => out.push_str(name),
            ExprNode::ParentSection { expr, .. } => {
                out.push_str("<~");
                self.write_expr(out, *expr);
            }
            ExprNode::SubSection { section, elements } => {
                let _ = write!(out, "{}~>", self.section(*section).name);
                if let [single] = elements.as_slice() {
                    self.write_expr(out, *single);
                } else {
                    out.push('{');
                    self.write_list(out, elements);
                    out.push('}');
                }
            }
        }
    }
}
