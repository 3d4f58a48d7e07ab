//! Binding a spreadsheet to a host contract
//!
//! [`SpreadsheetBinder`] connects cells of a [`Spreadsheet`] to the input and output slots of
//! the host's [`Shape`]s, declares repeating sections, and then walks the formulas reachable
//! from the bound cells to build a [`ComputationModel`].
//!
//! ```rust
//! use formcomp_compiler::{DataType, Shape, SpreadsheetBinder};
//! use formcomp_core::Spreadsheet;
//!
//! let mut book = Spreadsheet::new();
//! let sheet = book.sheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 1.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//!
//! let inputs = Shape::new().value("a", DataType::Numeric);
//! let outputs = Shape::new().value("b", DataType::Numeric);
//! let mut binder = SpreadsheetBinder::new(&book, inputs, outputs);
//! let root = binder.root();
//! binder.define_input_cell(root, "A1", "a").unwrap();
//! binder.define_output_cell(root, "B1", "b").unwrap();
//! let model = binder.bind().unwrap();
//! assert_eq!(model.cells().count(), 2);
//! ```

mod translate;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use formcomp_core::{CellIndex, CellValue, RangeIndex, Spreadsheet};
use tracing::{debug, debug_span};

use crate::dependency::DependencyGraph;
use crate::error::{CompilerError, CompilerResult};
use crate::model::{CellId, ComputationModel, Orientation, SectionId};
use crate::numeric::{DoubleType, NumericType};
use crate::shape::Shape;
use crate::value::Value;

/// Handle to a section declared on a [`SpreadsheetBinder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionKey(SectionId);

impl SectionKey {
    pub fn id(self) -> SectionId {
        self.0
    }
}

/// Shapes governing one section's slots
#[derive(Debug, Clone)]
struct SectionShapes {
    input: Shape,
    output: Option<Shape>,
}

/// Builds a [`ComputationModel`] from a spreadsheet and the host's input/output shapes
pub struct SpreadsheetBinder<'s> {
    book: &'s Spreadsheet,
    numeric: Arc<dyn NumericType>,
    model: ComputationModel,
    shapes: Vec<SectionShapes>,
    cells: HashMap<CellIndex, CellId>,
    pending: VecDeque<CellId>,
}

impl<'s> SpreadsheetBinder<'s> {
    pub fn new(book: &'s Spreadsheet, input: Shape, output: Shape) -> Self {
        let shapes = vec![SectionShapes {
            input: input.clone(),
            output: Some(output.clone()),
        }];
        Self {
            book,
            numeric: Arc::new(DoubleType),
            model: ComputationModel::new(input, output),
            shapes,
            cells: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Numeric type used to convert constants while binding (default: double)
    pub fn with_numeric_type(mut self, numeric: Arc<dyn NumericType>) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn root(&self) -> SectionKey {
        SectionKey(SectionId::ROOT)
    }

    /// Bind a cell (address or defined name) to an input value slot of `section`
    pub fn define_input_cell(
        &mut self,
        section: SectionKey,
        reference: &str,
        slot: &str,
    ) -> CompilerResult<()> {
        let index = self.resolve_cell(reference)?;
        let slot = self.shapes[section.0.index()]
            .input
            .value_slot(slot)
            .cloned()
            .ok_or_else(|| CompilerError::UnknownSlot {
                slot: slot.to_string(),
                side: "input",
            })?;
        self.check_cell_in_section(section.0, index)?;

        if let Some(CellValue::Formula { .. }) = self.book.cell(index) {
            return Err(CompilerError::InputHasFormula(self.book.describe_cell(index)));
        }
        if let Some(existing) = self.input_cell(section.0, &slot.name) {
            return Err(CompilerError::DuplicateSlot {
                slot: slot.name,
                cell: self.model.cell(existing).name.clone(),
            });
        }

        let id = self.cell_for(section.0, index)?;
        let cell = self.model.cell_mut(id);
        if let Some(previous) = &cell.input {
            return Err(CompilerError::DuplicateBinding {
                cell: cell.name.clone(),
                binding: format!("input '{}'", previous),
            });
        }
        debug!(cell = %cell.name, slot = %slot.name, "bound input");
        cell.input = Some(slot.name);
        cell.data_type = Some(slot.data_type);
        Ok(())
    }

    /// Bind a cell (address or defined name) to an output value slot of `section`
    pub fn define_output_cell(
        &mut self,
        section: SectionKey,
        reference: &str,
        slot: &str,
    ) -> CompilerResult<()> {
        let index = self.resolve_cell(reference)?;
        let slot = self.shapes[section.0.index()]
            .output
            .as_ref()
            .and_then(|shape| shape.value_slot(slot))
            .cloned()
            .ok_or_else(|| CompilerError::UnknownSlot {
                slot: slot.to_string(),
                side: "output",
            })?;
        self.check_cell_in_section(section.0, index)?;

        if let Some(existing) = self.model.output_cell(section.0, &slot.name) {
            return Err(CompilerError::DuplicateSlot {
                slot: slot.name,
                cell: self.model.cell(existing).name.clone(),
            });
        }

        let id = self.cell_for(section.0, index)?;
        let cell = self.model.cell_mut(id);
        debug!(cell = %cell.name, slot = %slot.name, "bound output");
        cell.outputs.push(slot.name);
        Ok(())
    }

    /// Declare a range whose first row (or column) repeats once per element of a section slot
    ///
    /// The section must lie within the first repetition of `parent`, must not share rows
    /// (columns) with a sibling of the same orientation, and must not contain cells bound
    /// before it was declared.
    pub fn define_repeating_section(
        &mut self,
        parent: SectionKey,
        range: &str,
        orientation: Orientation,
        input_slot: &str,
        output_slot: Option<&str>,
    ) -> CompilerResult<SectionKey> {
        let extent = self.resolve_range(range)?;
        let shape_error = |reason: String| CompilerError::SectionShape {
            range: range.to_string(),
            reason,
        };

        let parent_section = self.model.section(parent.0);
        if let Some(template) = parent_section.template {
            if !template.contains_range(&extent) {
                return Err(shape_error(format!(
                    "not inside the first repetition {} of section {}",
                    template, parent_section.name
                )));
            }
        }

        for &sibling in &parent_section.children {
            let other = self.model.section(sibling);
            let Some(other_range) = other.range else {
                continue;
            };
            let shares_lines = other.orientation == orientation
                && other_range.sheet == extent.sheet
                && match orientation {
                    Orientation::Vertical => {
                        other_range.first_row <= extent.last_row
                            && extent.first_row <= other_range.last_row
                    }
                    Orientation::Horizontal => {
                        other_range.first_col <= extent.last_col
                            && extent.first_col <= other_range.last_col
                    }
                };
            if other_range.overlaps(&extent) || shares_lines {
                return Err(shape_error(format!("overlaps section {}", other.name)));
            }
        }

        if let Some(cell) = parent_section
            .cells
            .iter()
            .map(|id| self.model.cell(*id))
            .find(|cell| extent.contains(cell.index))
        {
            return Err(shape_error(format!(
                "covers {} which is already bound outside of it",
                cell.name
            )));
        }

        let shapes = &self.shapes[parent.0.index()];
        let input = shapes
            .input
            .section_slot(input_slot)
            .cloned()
            .ok_or_else(|| CompilerError::UnknownSlot {
                slot: input_slot.to_string(),
                side: "input section",
            })?;
        let output = match output_slot {
            Some(name) => Some(
                shapes
                    .output
                    .as_ref()
                    .and_then(|shape| shape.section_slot(name))
                    .cloned()
                    .ok_or_else(|| CompilerError::UnknownSlot {
                        slot: name.to_string(),
                        side: "output section",
                    })?,
            ),
            None => None,
        };

        for &sibling in &self.model.section(parent.0).children {
            let other = self.model.section(sibling);
            if other.input_slot.as_deref() == Some(input.name.as_str()) {
                return Err(CompilerError::DuplicateSlot {
                    slot: input.name,
                    cell: other.name.clone(),
                });
            }
            if let (Some(slot), Some(bound)) = (&output, &other.output_slot) {
                if *bound == slot.name {
                    return Err(CompilerError::DuplicateSlot {
                        slot: slot.name.clone(),
                        cell: other.name.clone(),
                    });
                }
            }
        }

        let template = match orientation {
            Orientation::Vertical => RangeIndex::new(
                extent.sheet,
                extent.first_row,
                extent.first_col,
                extent.first_row,
                extent.last_col,
            ),
            Orientation::Horizontal => RangeIndex::new(
                extent.sheet,
                extent.first_row,
                extent.first_col,
                extent.last_row,
                extent.first_col,
            ),
        };

        let id = self
            .model
            .add_section(parent.0, input.name.clone(), orientation, extent, template);
        let section = self.model.section_mut(id);
        section.input_slot = Some(input.name.clone());
        section.output_slot = output.as_ref().map(|s| s.name.clone());
        debug!(section = %input.name, range = %extent, %orientation, "declared section");

        self.shapes.push(SectionShapes {
            input: input.shape,
            output: output.map(|s| s.shape),
        });
        Ok(SectionKey(id))
    }

    /// Bind every defined name that matches a root input or output slot
    ///
    /// Returns the number of bindings made. Names bound explicitly before are skipped.
    pub fn bind_all_by_name(&mut self) -> CompilerResult<usize> {
        let mut names: Vec<_> = self
            .book
            .names()
            .iter()
            .map(|n| n.name.clone())
            .collect();
        names.sort();
        names.dedup();

        let root = self.root();
        let mut bound = 0;
        for name in names {
            let Some(range) = self.book.resolve_name(&name, 0)? else {
                continue;
            };
            if !range.is_single_cell() {
                continue;
            }
            let input = self.model.input_shape().value_slot(&name).cloned();
            let output = self.model.output_shape().value_slot(&name).cloned();

            if let Some(slot) = input {
                if self.input_cell(SectionId::ROOT, &slot.name).is_none() {
                    self.define_input_cell(root, &name, &slot.name)?;
                    bound += 1;
                }
            }
            if let Some(slot) = output {
                if self.model.output_cell(SectionId::ROOT, &slot.name).is_none() {
                    self.define_output_cell(root, &name, &slot.name)?;
                    bound += 1;
                }
            }
        }
        Ok(bound)
    }

    /// Parse every formula reachable from the bound cells and check for cycles
    pub fn bind(mut self) -> CompilerResult<ComputationModel> {
        let span = debug_span!("bind");
        let _enter = span.enter();

        while let Some(id) = self.pending.pop_front() {
            let cell = self.model.cell(id);
            let (index, section, name) = (cell.index, cell.section, cell.name.clone());
            let Some(CellValue::Formula { text, style }) = self.book.cell(index) else {
                continue;
            };
            let expr = self
                .translate_formula(section, index, text, *style)
                .map_err(|e| e.in_cell(&name))?;
            self.model.cell_mut(id).expression = Some(expr);
        }

        let graph = DependencyGraph::from_model(&self.model);
        if let Err(cell) = graph.evaluation_order() {
            return Err(CompilerError::CyclicReference(
                self.model.cell(cell).name.clone(),
            ));
        }

        debug!(
            cells = self.model.cells().count(),
            sections = self.model.sections().count(),
            "bound model"
        );
        Ok(self.model)
    }

    // === Helpers ===

    fn resolve_range(&self, reference: &str) -> CompilerResult<RangeIndex> {
        if let Some(range) = self.book.resolve_name(reference, 0)? {
            return Ok(range);
        }
        self.book
            .resolve_reference(reference, 0)
            .map_err(|_| CompilerError::UnknownName(reference.to_string()))
    }

    fn resolve_cell(&self, reference: &str) -> CompilerResult<CellIndex> {
        let range = self.resolve_range(reference)?;
        if !range.is_single_cell() {
            return Err(CompilerError::InvalidReference {
                reference: reference.to_string(),
                reason: "expected a single cell".to_string(),
            });
        }
        Ok(range.top_left())
    }

    fn input_cell(&self, section: SectionId, slot: &str) -> Option<CellId> {
        self.model
            .section(section)
            .cells
            .iter()
            .copied()
            .find(|id| self.model.cell(*id).input.as_deref() == Some(slot))
    }

    /// Innermost section whose first repetition contains the whole range
    fn owner(&self, range: &RangeIndex) -> SectionId {
        let mut current = SectionId::ROOT;
        'descend: loop {
            for &child in &self.model.section(current).children {
                let template = self.model.section(child).template;
                if template.map_or(false, |t| t.contains_range(range)) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    fn check_cell_in_section(&self, section: SectionId, index: CellIndex) -> CompilerResult<()> {
        let owner = self.owner(&RangeIndex::single(index));
        if owner == section {
            return Ok(());
        }
        let in_repetition = self
            .model
            .sections()
            .any(|(_, s)| s.range.map_or(false, |r| r.contains(index)));
        let reason = if in_repetition {
            format!(
                "not in the first repetition of section {}",
                self.model.section(section).name
            )
        } else {
            format!("not in section {}", self.model.section(section).name)
        };
        Err(CompilerError::InvalidReference {
            reference: self.book.describe_cell(index),
            reason,
        })
    }

    /// The model cell for a sheet cell, created on first use
    fn cell_for(&mut self, section: SectionId, index: CellIndex) -> CompilerResult<CellId> {
        if let Some(id) = self.cells.get(&index) {
            return Ok(*id);
        }
        let name = self.book.describe_cell(index);
        let id = self.model.add_cell(section, name, index);
        self.cells.insert(index, id);

        match self.book.cell(index) {
            None | Some(CellValue::Empty) => {}
            Some(CellValue::Formula { .. }) => self.pending.push_back(id),
            Some(content) => {
                let constant = self.constant_value(content)?;
                self.model.cell_mut(id).constant = Some(constant);
            }
        }
        Ok(id)
    }

    fn constant_value(&self, content: &CellValue) -> CompilerResult<Value> {
        let number = match content {
            CellValue::String(text) => return Ok(Value::Text(text.clone())),
            CellValue::Empty | CellValue::Formula { .. } => return Ok(Value::Null),
            CellValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Number(n) => *n,
            CellValue::Date(date) => formcomp_core::cell::excel_serial(date),
        };
        let number = self.numeric.from_f64(number)?;
        Ok(Value::Number(self.numeric.adjust_constant(number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExprNode;
    use crate::value::DataType;
    use pretty_assertions::assert_eq;

    fn numeric_shape(names: &[&str]) -> Shape {
        names
            .iter()
            .fold(Shape::new(), |shape, name| shape.value(*name, DataType::Numeric))
    }

    fn output_expr(model: &ComputationModel, slot: &str) -> String {
        let cell = model.output_cell(model.root(), slot).unwrap();
        model.describe_expr(model.cell(cell).expression.unwrap())
    }

    #[test]
    fn test_bind_simple_formula() {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_formula("B1", "=A1*2").unwrap();

        let mut binder = SpreadsheetBinder::new(&book, numeric_shape(&["a"]), numeric_shape(&["b"]));
        let root = binder.root();
        binder.define_input_cell(root, "A1", "a").unwrap();
        binder.define_output_cell(root, "B1", "b").unwrap();
        let model = binder.bind().unwrap();

        assert_eq!(
            model.describe(),
            "root\n  A1 = 1 : numeric <- a\n  B1 = (A1 * 2) -> b\n"
        );
    }

    #[test]
    fn test_cells_are_created_on_demand() {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 5.0).unwrap();
        sheet.set_cell_formula("B1", "=A1+1").unwrap();
        sheet.set_cell_formula("C1", "=B1*B1").unwrap();
        sheet.set_cell_formula("Z9", "=1/0").unwrap();

        let mut binder = SpreadsheetBinder::new(&book, Shape::new(), numeric_shape(&["c"]));
        let root = binder.root();
        binder.define_output_cell(root, "C1", "c").unwrap();
        let model = binder.bind().unwrap();

        let names: Vec<_> = model.cells().map(|(_, c)| c.name.clone()).collect();
        assert_eq!(names, vec!["C1", "B1", "A1"]);
        assert_eq!(output_expr(&model, "c"), "(B1 * B1)");
    }

    #[test]
    fn test_r1c1_and_blank_references() {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_formula_r1c1("B2", "=R[-1]C[-1]+RC[-1]").unwrap();
        sheet.set_cell_value("A1", 3.0).unwrap();

        let mut binder = SpreadsheetBinder::new(&book, Shape::new(), numeric_shape(&["r"]));
        let root = binder.root();
        binder.define_output_cell(root, "B2", "r").unwrap();
        let model = binder.bind().unwrap();

        // A2 is blank
        assert_eq!(output_expr(&model, "r"), "(A1 + noop)");
    }

    #[test]
    fn test_defined_names() {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 2.0).unwrap();
        sheet.set_cell_formula("B1", "=Price*3").unwrap();
        book.define_name("Price", "$A$1").unwrap();
        book.define_name("Total", "$B$1").unwrap();

        let mut binder =
            SpreadsheetBinder::new(&book, numeric_shape(&["price"]), numeric_shape(&["total"]));
        assert_eq!(binder.bind_all_by_name().unwrap(), 2);
        let model = binder.bind().unwrap();
        assert_eq!(output_expr(&model, "total"), "(A1 * 3)");
        let a1 = model.cells().find(|(_, c)| c.name == "A1").unwrap().1;
        assert_eq!(a1.input.as_deref(), Some("price"));
    }

    #[test]
    fn test_binding_errors() {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_formula("B1", "=A1").unwrap();

        let mut binder =
            SpreadsheetBinder::new(&book, numeric_shape(&["a", "b"]), numeric_shape(&["x"]));
        let root = binder.root();

        binder.define_input_cell(root, "A1", "a").unwrap();
        assert!(matches!(
            binder.define_input_cell(root, "A1", "b"),
            Err(CompilerError::DuplicateBinding { .. })
        ));
        assert!(matches!(
            binder.define_input_cell(root, "C1", "a"),
            Err(CompilerError::DuplicateSlot { .. })
        ));
        assert!(matches!(
            binder.define_input_cell(root, "B1", "b"),
            Err(CompilerError::InputHasFormula(_))
        ));
        assert!(matches!(
            binder.define_input_cell(root, "A1", "nope"),
            Err(CompilerError::UnknownSlot { side: "input", .. })
        ));
        assert!(matches!(
            binder.define_output_cell(root, "NoSuchName", "x"),
            Err(CompilerError::UnknownName(_))
        ));
        assert!(matches!(
            binder.define_output_cell(root, "A1:B2", "x"),
            Err(CompilerError::InvalidReference { .. })
        ));

        binder.define_output_cell(root, "B1", "x").unwrap();
        assert!(matches!(
            binder.define_output_cell(root, "A1", "x"),
            Err(CompilerError::DuplicateSlot { .. })
        ));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=C1+1").unwrap();
        sheet.set_cell_formula("B1", "=A1").unwrap();
        sheet.set_cell_formula("C1", "=B1").unwrap();

        let mut binder = SpreadsheetBinder::new(&book, Shape::new(), numeric_shape(&["x"]));
        let root = binder.root();
        binder.define_output_cell(root, "A1", "x").unwrap();
        assert!(matches!(
            binder.bind(),
            Err(CompilerError::CyclicReference(_))
        ));
    }

    #[test]
    fn test_range_outside_aggregate_is_unsupported() {
        let mut book = Spreadsheet::new();
        book.sheet_mut(0)
            .unwrap()
            .set_cell_formula("C1", "=A1:B1")
            .unwrap();

        let mut binder = SpreadsheetBinder::new(&book, Shape::new(), numeric_shape(&["x"]));
        let root = binder.root();
        binder.define_output_cell(root, "C1", "x").unwrap();
        let err = binder.bind().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            CompilerError::UnsupportedExpression { .. }
        ));
        assert!(err.to_string().ends_with("(in cell C1)"));
    }

    /// Items in A2:B4 (price, discounted price), rate in D1, total in D2, bad references below
    fn order_book() -> Spreadsheet {
        let mut book = Spreadsheet::new();
        let sheet = book.sheet_mut(0).unwrap();
        sheet.set_cell_value("D1", 0.5).unwrap();
        for row in 2..=4 {
            sheet.set_cell_value(&format!("A{}", row), row as f64).unwrap();
            sheet
                .set_cell_formula(&format!("B{}", row), &format!("=A{}*$D$1", row))
                .unwrap();
        }
        sheet.set_cell_formula("D2", "=SUM(B2:B4)").unwrap();
        sheet.set_cell_formula("D3", "=B3").unwrap();
        sheet.set_cell_formula("D4", "=SUM(B2:B3)").unwrap();
        sheet.set_cell_formula("D5", "=INDEX(B2:B4, 2)").unwrap();
        book
    }

    fn order_shapes() -> (Shape, Shape) {
        let inputs = Shape::new()
            .value("rate", DataType::Numeric)
            .section("items", numeric_shape(&["price"]));
        let outputs = Shape::new()
            .value("total", DataType::Numeric)
            .value("bad", DataType::Numeric)
            .section("lines", numeric_shape(&["amount"]));
        (inputs, outputs)
    }

    #[test]
    fn test_repeating_section() {
        let book = order_book();
        let (inputs, outputs) = order_shapes();
        let mut binder = SpreadsheetBinder::new(&book, inputs, outputs);
        let root = binder.root();
        let items = binder
            .define_repeating_section(root, "A2:B4", Orientation::Vertical, "items", Some("lines"))
            .unwrap();
        binder.define_input_cell(items, "A2", "price").unwrap();
        binder.define_output_cell(items, "B2", "amount").unwrap();
        binder.define_input_cell(root, "D1", "rate").unwrap();
        binder.define_output_cell(root, "D2", "total").unwrap();
        let model = binder.bind().unwrap();

        assert_eq!(output_expr(&model, "total"), "SUM(items~>B2)");
        let amount = model.output_cell(items.id(), "amount").unwrap();
        assert_eq!(
            model.describe_expr(model.cell(amount).expression.unwrap()),
            "(A2 * <~D1)"
        );
        assert_eq!(model.cell(amount).section, items.id());
        assert_eq!(
            model.section(items.id()).template,
            Some(RangeIndex::new(0, 1, 0, 1, 1))
        );
    }

    #[test]
    fn test_section_reference_errors() {
        let book = order_book();
        for (cell, reason) in [
            ("D3", "partially covers section items (A2:B4)"),
            ("D4", "partially covers"),
            ("D5", "INDEX over a repeating section"),
        ] {
            let (inputs, outputs) = order_shapes();
            let mut binder = SpreadsheetBinder::new(&book, inputs, outputs);
            let root = binder.root();
            binder
                .define_repeating_section(root, "A2:B4", Orientation::Vertical, "items", None)
                .unwrap();
            binder.define_output_cell(root, cell, "bad").unwrap();
            let err = binder.bind().unwrap_err();
            assert!(err.to_string().contains(reason), "{}: {}", cell, err);
        }
    }

    #[test]
    fn test_section_shape_errors() {
        let book = order_book();
        let (inputs, outputs) = order_shapes();
        let mut binder = SpreadsheetBinder::new(&book, inputs, outputs);
        let root = binder.root();
        let items = binder
            .define_repeating_section(root, "A2:B4", Orientation::Vertical, "items", None)
            .unwrap();

        assert!(matches!(
            binder.define_repeating_section(root, "D2:D4", Orientation::Vertical, "items", None),
            Err(CompilerError::SectionShape { .. })
        ));
        assert!(matches!(
            binder.define_repeating_section(root, "A6:B8", Orientation::Vertical, "orders", None),
            Err(CompilerError::UnknownSlot { .. })
        ));
        assert!(matches!(
            binder.define_input_cell(items, "A3", "price"),
            Err(CompilerError::InvalidReference { .. })
        ));
        assert!(matches!(
            binder.define_input_cell(root, "A2", "rate"),
            Err(CompilerError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_horizontal_section_shape() {
        let book = Spreadsheet::new();
        let months = numeric_shape(&["sales"]).section("weeks", numeric_shape(&["units"]));
        let inputs = Shape::new()
            .section("months", months)
            .section("other", numeric_shape(&["x"]));
        let mut binder = SpreadsheetBinder::new(&book, inputs, Shape::new());
        let root = binder.root();
        let months = binder
            .define_repeating_section(root, "F1:H2", Orientation::Horizontal, "months", None)
            .unwrap();
        assert_eq!(
            binder.model.section(months.id()).template,
            Some(RangeIndex::new(0, 0, 5, 1, 5))
        );

        // Same orientation sharing column G
        let err = binder
            .define_repeating_section(root, "G5:G6", Orientation::Horizontal, "other", None)
            .unwrap_err();
        assert!(err.to_string().contains("overlaps section months"), "{}", err);

        // Second column of a horizontal section is not its first repetition
        let err = binder
            .define_repeating_section(months, "G1:G2", Orientation::Vertical, "weeks", None)
            .unwrap_err();
        assert!(err.to_string().contains("not inside the first repetition F1:F2"), "{}", err);
        assert!(matches!(
            binder.define_input_cell(months, "G2", "sales"),
            Err(CompilerError::InvalidReference { .. })
        ));

        let weeks = binder
            .define_repeating_section(months, "F1:F2", Orientation::Vertical, "weeks", None)
            .unwrap();
        assert_eq!(
            binder.model.section(weeks.id()).template,
            Some(RangeIndex::new(0, 0, 5, 0, 5))
        );
        binder
            .define_repeating_section(root, "J1:K2", Orientation::Vertical, "other", None)
            .unwrap();
    }
}
