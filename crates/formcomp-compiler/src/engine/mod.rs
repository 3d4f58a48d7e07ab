//! Evaluating a transformed model
//!
//! An [`Engine`] owns a frozen [`ComputationModel`] and hands out one [`Computation`] per input
//! object. Computations evaluate cells on demand, walking repeating sections through
//! [`Inputs::rows`], and cache each cell value per section repetition.
//!
//! ```rust,ignore
//! let engine = Engine::new(model, numeric);
//! let inputs = Record::new().with("a", 2.0);
//! let computation = engine.computation(&inputs);
//! assert_eq!(computation.get("b")?, Value::from(4.0));
//! ```

mod builtins;
mod interpreter;

pub(crate) use interpreter::{Env, Interpreter, NoFrame};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use crate::config::ComputationOptions;
use crate::error::{EvalError, EvalResult};
use crate::model::{CellId, ComputationModel, SectionId};
use crate::numeric::NumericType;
use crate::shape::Shape;
use crate::value::{DataType, Value};

use interpreter::Host;

/// Input values supplied by the host, one object per computation or section row
pub trait Inputs {
    /// Value of a value slot; `None` if the host has none
    fn value(&self, slot: &str) -> Option<Value>;

    /// Rows of a section slot, in order
    fn rows(&self, section: &str) -> Vec<&dyn Inputs>;
}

/// Map-backed [`Inputs`]; slot names match case-insensitively
#[derive(Debug, Clone, Default)]
pub struct Record {
    values: HashMap<String, Value>,
    sections: HashMap<String, Vec<Record>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: &str, value: impl Into<Value>) -> Self {
        self.values.insert(slot.to_lowercase(), value.into());
        self
    }

    pub fn with_rows(mut self, section: &str, rows: Vec<Record>) -> Self {
        self.sections.insert(section.to_lowercase(), rows);
        self
    }

    pub fn set(&mut self, slot: &str, value: impl Into<Value>) {
        self.values.insert(slot.to_lowercase(), value.into());
    }
}

impl Inputs for Record {
    fn value(&self, slot: &str) -> Option<Value> {
        self.values.get(&slot.to_lowercase()).cloned()
    }

    fn rows(&self, section: &str) -> Vec<&dyn Inputs> {
        self.sections
            .get(&section.to_lowercase())
            .map(|rows| rows.iter().map(|r| r as &dyn Inputs).collect())
            .unwrap_or_default()
    }
}

/// A compiled computation, shareable across threads
#[derive(Debug, Clone)]
pub struct Engine {
    model: Arc<ComputationModel>,
    numeric: Arc<dyn NumericType>,
    options: ComputationOptions,
}

impl Engine {
    pub fn new(model: ComputationModel, numeric: Arc<dyn NumericType>) -> Self {
        Self {
            model: Arc::new(model),
            numeric,
            options: ComputationOptions::default(),
        }
    }

    /// Default options for computations created by [`Engine::computation`]
    pub fn with_options(mut self, options: ComputationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &ComputationModel {
        &self.model
    }

    pub fn numeric_type(&self) -> &dyn NumericType {
        self.numeric.as_ref()
    }

    pub fn options(&self) -> ComputationOptions {
        self.options
    }

    pub fn computation<'i>(&self, inputs: &'i dyn Inputs) -> Computation<'i> {
        self.computation_with(inputs, self.options)
    }

    pub fn computation_with<'i>(
        &self,
        inputs: &'i dyn Inputs,
        options: ComputationOptions,
    ) -> Computation<'i> {
        let root = Rc::new(Frame {
            section: self.model.root(),
            inputs,
            parent: None,
            path: Vec::new(),
        });
        Computation {
            model: Arc::clone(&self.model),
            numeric: Arc::clone(&self.numeric),
            options,
            root,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

/// One repetition of a section during evaluation
struct Frame<'i> {
    section: SectionId,
    inputs: &'i dyn Inputs,
    parent: Option<Rc<Frame<'i>>>,
    /// (section, row) pairs from the root, identifying the repetition
    path: Vec<u32>,
}

type CacheKey = (Vec<u32>, CellId);

/// Evaluation of a compiled model over one input object
///
/// Not `Sync`; each thread creates its own from a shared [`Engine`].
pub struct Computation<'i> {
    model: Arc<ComputationModel>,
    numeric: Arc<dyn NumericType>,
    options: ComputationOptions,
    root: Rc<Frame<'i>>,
    cache: RefCell<HashMap<CacheKey, Value>>,
}

impl<'i> Computation<'i> {
    /// Value of a root output slot, converted to the slot's declared type
    pub fn get(&self, slot: &str) -> EvalResult<Value> {
        self.output(&self.root, self.model.output_shape(), slot)
    }

    /// Rows of a root output section slot
    pub fn rows(&self, section: &str) -> EvalResult<Vec<SectionRow<'_, 'i>>> {
        self.section_rows(&self.root, self.model.output_shape(), section)
    }

    /// Forget every cached value
    pub fn reset(&mut self) {
        self.cache.get_mut().clear();
    }

    pub fn options(&self) -> ComputationOptions {
        self.options
    }

    fn output(&self, frame: &Rc<Frame<'i>>, shape: &Shape, slot: &str) -> EvalResult<Value> {
        let declared = shape
            .value_slot(slot)
            .ok_or_else(|| EvalError::UnknownOutput(slot.to_string()))?;
        let cell = self
            .model
            .output_cell(frame.section, &declared.name)
            .ok_or_else(|| EvalError::UnknownOutput(slot.to_string()))?;
        let value = self.cell_value(frame, cell)?;
        value
            .coerce(declared.data_type, self.numeric.as_ref())
            .map_err(|e| EvalError::from(e).in_cell(self.model.cell(cell).name.clone()))
    }

    fn section_rows<'c>(
        &'c self,
        frame: &Rc<Frame<'i>>,
        shape: &'c Shape,
        slot: &str,
    ) -> EvalResult<Vec<SectionRow<'c, 'i>>> {
        let declared = shape
            .section_slot(slot)
            .ok_or_else(|| EvalError::UnknownSection(slot.to_string()))?;
        let section = self
            .model
            .output_section(frame.section, &declared.name)
            .ok_or_else(|| EvalError::UnknownSection(slot.to_string()))?;
        Ok(self
            .child_frames(frame, section)?
            .into_iter()
            .enumerate()
            .map(|(index, frame)| SectionRow {
                computation: self,
                frame,
                shape: &declared.shape,
                index,
            })
            .collect())
    }

    fn child_frames(&self, frame: &Rc<Frame<'i>>, section: SectionId) -> EvalResult<Vec<Rc<Frame<'i>>>> {
        let model = self.model.section(section);
        if model.parent != Some(frame.section) {
            return Err(EvalError::Internal(format!(
                "section {} is not a child of {}",
                model.name,
                self.model.section(frame.section).name
            )));
        }
        let slot = model
            .input_slot
            .as_deref()
            .ok_or_else(|| EvalError::UnknownSection(model.name.clone()))?;
        Ok(frame
            .inputs
            .rows(slot)
            .into_iter()
            .enumerate()
            .map(|(row, inputs)| {
                let mut path = frame.path.clone();
                path.push(section.index() as u32);
                path.push(row as u32);
                Rc::new(Frame {
                    section,
                    inputs,
                    parent: Some(Rc::clone(frame)),
                    path,
                })
            })
            .collect())
    }

    fn cell_value(&self, frame: &Rc<Frame<'i>>, id: CellId) -> EvalResult<Value> {
        let key = (frame.path.clone(), id);
        if self.options.caching {
            if let Some(value) = self.cache.borrow().get(&key) {
                return Ok(value.clone());
            }
        }

        let cell = self.model.cell(id);
        if cell.section != frame.section {
            return Err(EvalError::Internal(format!(
                "cell {} read outside of its section",
                cell.name
            )));
        }
        trace!(cell = %cell.name, path = ?frame.path, "computing");

        let numeric = self.numeric.as_ref();
        let value = if let Some(slot) = &cell.input {
            let value = frame
                .inputs
                .value(slot)
                .ok_or_else(|| EvalError::MissingInput(slot.clone()))?;
            match cell.data_type {
                Some(declared @ (DataType::Numeric | DataType::String)) => value
                    .coerce(declared, numeric)
                    .map_err(|e| EvalError::from(e).in_cell(cell.name.clone()))?,
                _ => value,
            }
        } else if let Some(expr) = cell.expression {
            let host = FrameHost {
                computation: self,
                frame: Rc::clone(frame),
            };
            Interpreter::new(self.model.exprs(), numeric)
                .eval(&host, expr, &mut Env::new())
                .map_err(|e| e.in_cell(cell.name.clone()))?
        } else {
            cell.constant.clone().unwrap_or_default()
        };

        if self.options.caching {
            self.cache.borrow_mut().insert(key, value.clone());
        }
        Ok(value)
    }
}

/// One repetition of an output section
pub struct SectionRow<'c, 'i> {
    computation: &'c Computation<'i>,
    frame: Rc<Frame<'i>>,
    shape: &'c Shape,
    index: usize,
}

impl<'c, 'i> SectionRow<'c, 'i> {
    /// Position of the row, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, slot: &str) -> EvalResult<Value> {
        self.computation.output(&self.frame, self.shape, slot)
    }

    pub fn rows(&self, section: &str) -> EvalResult<Vec<SectionRow<'c, 'i>>> {
        self.computation
            .section_rows(&self.frame, self.shape, section)
    }
}

/// [`Host`] view of a computation positioned on one frame
struct FrameHost<'c, 'i> {
    computation: &'c Computation<'i>,
    frame: Rc<Frame<'i>>,
}

impl Host for FrameHost<'_, '_> {
    fn cell(&self, cell: CellId) -> EvalResult<Value> {
        self.computation.cell_value(&self.frame, cell)
    }

    fn parent(&self, section: SectionId) -> EvalResult<Self> {
        match &self.frame.parent {
            Some(parent) if self.frame.section == section => Ok(FrameHost {
                computation: self.computation,
                frame: Rc::clone(parent),
            }),
            _ => Err(EvalError::Internal(format!(
                "no frame enclosing section {}",
                self.computation.model.section(section).name
            ))),
        }
    }

    fn rows(&self, section: SectionId) -> EvalResult<Vec<Self>> {
        Ok(self
            .computation
            .child_frames(&self.frame, section)?
            .into_iter()
            .map(|frame| FrameHost {
                computation: self.computation,
                frame,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExprNode, Operator, Orientation};
    use crate::numeric::DoubleType;
    use formcomp_core::{CellIndex, RangeIndex};
    use formcomp_formula::Function;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// `b = a * 2`, `total = SUM(items~>amount)` with `amount = price * <~a`
    fn order_model() -> ComputationModel {
        let inputs = Shape::new()
            .value("a", DataType::Numeric)
            .section("items", Shape::new().value("price", DataType::Numeric));
        let outputs = Shape::new()
            .value("b", DataType::Numeric)
            .value("total", DataType::String)
            .section("lines", Shape::new().value("amount", DataType::Numeric));
        let mut model = ComputationModel::new(inputs, outputs);
        let root = model.root();
        let items = model.add_section(
            root,
            "items",
            Orientation::Vertical,
            RangeIndex::new(0, 1, 0, 3, 1),
            RangeIndex::new(0, 1, 0, 1, 1),
        );
        model.section_mut(items).input_slot = Some("items".into());
        model.section_mut(items).output_slot = Some("lines".into());

        let a = model.add_cell(root, "A1", CellIndex::new(0, 0, 0));
        model.cell_mut(a).input = Some("a".into());
        model.cell_mut(a).data_type = Some(DataType::Numeric);

        let b = model.add_cell(root, "B1", CellIndex::new(0, 0, 1));
        let a_ref = model.add_expr(ExprNode::CellRef(a));
        let two = model.add_expr(ExprNode::constant(2.0));
        let times = model.add_expr(ExprNode::op(Operator::Times, vec![a_ref, two]));
        model.cell_mut(b).expression = Some(times);
        model.cell_mut(b).outputs.push("b".into());

        let price = model.add_cell(items, "A2", CellIndex::new(0, 1, 0));
        model.cell_mut(price).input = Some("price".into());
        model.cell_mut(price).data_type = Some(DataType::Numeric);
        let amount = model.add_cell(items, "B2", CellIndex::new(0, 1, 1));
        let price_ref = model.add_expr(ExprNode::CellRef(price));
        let outer_a = model.add_expr(ExprNode::ParentSection {
            section: items,
            expr: a_ref,
        });
        let product = model.add_expr(ExprNode::op(Operator::Times, vec![price_ref, outer_a]));
        model.cell_mut(amount).expression = Some(product);
        model.cell_mut(amount).outputs.push("amount".into());

        let total = model.add_cell(root, "D1", CellIndex::new(0, 0, 3));
        let amount_ref = model.add_expr(ExprNode::CellRef(amount));
        let sub = model.add_expr(ExprNode::SubSection {
            section: items,
            elements: vec![amount_ref],
        });
        let seed = model.add_expr(ExprNode::constant(0.0));
        let acc = model.add_expr(ExprNode::LetVar("acc".into()));
        let x = model.add_expr(ExprNode::LetVar("x".into()));
        let step = model.add_expr(ExprNode::op(Operator::Plus, vec![acc, x]));
        let sum = model.add_expr(ExprNode::Fold {
            acc: "acc".into(),
            elt: "x".into(),
            seed,
            step,
            when_empty: None,
            source: vec![sub],
        });
        model.cell_mut(total).expression = Some(sum);
        model.cell_mut(total).outputs.push("total".into());
        model
    }

    fn order_inputs() -> Record {
        Record::new().with("a", 3.0).with_rows(
            "items",
            vec![
                Record::new().with("price", 1.0),
                Record::new().with("price", 2.5),
            ],
        )
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn test_outputs_and_sections() {
        let engine = Engine::new(order_model(), Arc::new(DoubleType));
        let inputs = order_inputs();
        let computation = engine.computation(&inputs);

        assert_eq!(computation.get("b").unwrap(), Value::from(6.0));
        assert_eq!(computation.get("TOTAL").unwrap(), Value::text("10.5"));

        let lines = computation.rows("lines").unwrap();
        let amounts: Vec<_> = lines.iter().map(|r| r.get("amount").unwrap()).collect();
        assert_eq!(amounts, vec![Value::from(3.0), Value::from(7.5)]);
        assert_eq!(lines[1].index(), 1);
    }

    #[test]
    fn test_errors() {
        let engine = Engine::new(order_model(), Arc::new(DoubleType));
        let empty = Record::new();
        let computation = engine.computation(&empty);
        assert_eq!(
            computation.get("b").unwrap_err().root_cause(),
            &EvalError::MissingInput("a".into())
        );
        assert!(matches!(computation.get("nope"), Err(EvalError::UnknownOutput(_))));
        assert!(matches!(computation.rows("nope"), Err(EvalError::UnknownSection(_))));
        // no rows supplied: the sum is empty
        assert_eq!(computation.get("total").unwrap(), Value::text("0"));

        let inputs = Record::new().with("a", "x");
        let computation = engine.computation(&inputs);
        assert!(matches!(
            computation.get("b").unwrap_err().root_cause(),
            EvalError::Numeric(_)
        ));
    }

    /// Inputs that count how often a slot is read
    struct Counting {
        reads: Cell<usize>,
    }

    impl Inputs for Counting {
        fn value(&self, _slot: &str) -> Option<Value> {
            self.reads.set(self.reads.get() + 1);
            Some(Value::from(self.reads.get() as f64))
        }

        fn rows(&self, _section: &str) -> Vec<&dyn Inputs> {
            Vec::new()
        }
    }

    #[test]
    fn test_caching_contract() {
        let engine = Engine::new(order_model(), Arc::new(DoubleType));
        let inputs = Counting { reads: Cell::new(0) };

        let mut cached = engine.computation(&inputs);
        assert_eq!(cached.get("b").unwrap(), Value::from(2.0));
        assert_eq!(cached.get("b").unwrap(), Value::from(2.0));
        assert_eq!(inputs.reads.get(), 1);
        cached.reset();
        assert_eq!(cached.get("b").unwrap(), Value::from(4.0));

        let uncached = engine.computation_with(&inputs, ComputationOptions { caching: false });
        assert_eq!(uncached.get("b").unwrap(), Value::from(6.0));
        assert_eq!(uncached.get("b").unwrap(), Value::from(8.0));
    }

    #[test]
    fn test_each_computation_has_its_own_cache() {
        let engine = Engine::new(order_model(), Arc::new(DoubleType));
        let inputs = Counting { reads: Cell::new(0) };

        let first = engine.computation(&inputs);
        assert_eq!(first.get("b").unwrap(), Value::from(2.0));
        let second = engine.computation(&inputs);
        assert_eq!(second.get("b").unwrap(), Value::from(4.0));
        assert_eq!(first.get("b").unwrap(), Value::from(2.0));
        assert_eq!(second.get("b").unwrap(), Value::from(4.0));
        assert_eq!(inputs.reads.get(), 2);
    }

    #[test]
    fn test_volatile_value_is_stable_when_cached() {
        let mut model = ComputationModel::new(Shape::new(), Shape::new().value("r", DataType::Numeric));
        let cell = model.add_cell(model.root(), "A1", CellIndex::new(0, 0, 0));
        let rand = model.add_expr(ExprNode::Function {
            function: Function::Rand,
            args: Vec::new(),
        });
        model.cell_mut(cell).expression = Some(rand);
        model.cell_mut(cell).outputs.push("r".into());

        let engine = Engine::new(model, Arc::new(DoubleType));
        let inputs = Record::new();
        let computation = engine.computation(&inputs);
        assert_eq!(computation.get("r").unwrap(), computation.get("r").unwrap());
    }
}
