//! One-stop compilation of a spreadsheet into an [`Engine`]
//!
//! # Example
//!
//! ```rust
//! use formcomp::prelude::*;
//!
//! let mut book = Spreadsheet::new();
//! let sheet = book.sheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 1.0).unwrap();
//! sheet.set_cell_value("B1", 2.0).unwrap();
//! sheet.set_cell_formula("C1", "=SUM(A1:B1)").unwrap();
//!
//! let mut builder = EngineBuilder::new(
//!     &book,
//!     Shape::new().value("a", DataType::Numeric).value("b", DataType::Numeric),
//!     Shape::new().value("total", DataType::Numeric),
//! )
//! .unwrap();
//! builder.input("A1", "a").unwrap().input("B1", "b").unwrap();
//! builder.output("C1", "total").unwrap();
//! let engine = builder.build().unwrap();
//!
//! let inputs = Record::new().with("a", 1.0).with("b", 2.0);
//! assert_eq!(engine.computation(&inputs).get("total").unwrap(), Value::from(3.0));
//! ```

use std::sync::Arc;

use formcomp_compiler::{
    CompilerConfig, CompilerResult, ComputationModel, Engine, ModelTransformer, NumericType,
    Orientation, SectionKey, Shape, SpreadsheetBinder,
};
use formcomp_core::Spreadsheet;
use tracing::info;

/// Binds cells to a host contract, then compiles them with a [`CompilerConfig`]
pub struct EngineBuilder<'s> {
    binder: SpreadsheetBinder<'s>,
    numeric: Arc<dyn NumericType>,
    config: CompilerConfig,
}

impl<'s> EngineBuilder<'s> {
    /// Builder with the default configuration (double arithmetic, caching, all passes)
    pub fn new(book: &'s Spreadsheet, inputs: Shape, outputs: Shape) -> CompilerResult<Self> {
        Self::with_config(book, inputs, outputs, CompilerConfig::default())
    }

    pub fn with_config(
        book: &'s Spreadsheet,
        inputs: Shape,
        outputs: Shape,
        config: CompilerConfig,
    ) -> CompilerResult<Self> {
        let numeric = config.numeric_type.build()?;
        let binder =
            SpreadsheetBinder::new(book, inputs, outputs).with_numeric_type(Arc::clone(&numeric));
        Ok(Self {
            binder,
            numeric,
            config,
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn root(&self) -> SectionKey {
        self.binder.root()
    }

    /// Bind a root cell or defined name to an input slot
    pub fn input(&mut self, reference: &str, slot: &str) -> CompilerResult<&mut Self> {
        let root = self.root();
        self.section_input(root, reference, slot)
    }

    /// Bind a root cell or defined name to an output slot
    pub fn output(&mut self, reference: &str, slot: &str) -> CompilerResult<&mut Self> {
        let root = self.root();
        self.section_output(root, reference, slot)
    }

    pub fn section_input(
        &mut self,
        section: SectionKey,
        reference: &str,
        slot: &str,
    ) -> CompilerResult<&mut Self> {
        self.binder.define_input_cell(section, reference, slot)?;
        Ok(self)
    }

    pub fn section_output(
        &mut self,
        section: SectionKey,
        reference: &str,
        slot: &str,
    ) -> CompilerResult<&mut Self> {
        self.binder.define_output_cell(section, reference, slot)?;
        Ok(self)
    }

    /// Declare a repeating section; see [`SpreadsheetBinder::define_repeating_section`]
    pub fn repeating_section(
        &mut self,
        parent: SectionKey,
        range: &str,
        orientation: Orientation,
        input_slot: &str,
        output_slot: Option<&str>,
    ) -> CompilerResult<SectionKey> {
        self.binder
            .define_repeating_section(parent, range, orientation, input_slot, output_slot)
    }

    /// Bind every defined name matching a root slot; returns the number of bindings made
    pub fn bind_all_by_name(&mut self) -> CompilerResult<usize> {
        self.binder.bind_all_by_name()
    }

    /// Bind and transform, returning the model the engine would run
    pub fn compile(self) -> CompilerResult<ComputationModel> {
        let mut model = self.binder.bind()?;
        ModelTransformer::new(self.numeric.as_ref(), &self.config).transform(&mut model)?;
        Ok(model)
    }

    pub fn build(self) -> CompilerResult<Engine> {
        let numeric = Arc::clone(&self.numeric);
        let options = self.config.computation_options();
        let model = self.compile()?;
        info!(
            cells = model.cells().count(),
            numeric = %numeric.name(),
            "compiled engine"
        );
        Ok(Engine::new(model, numeric).with_options(options))
    }
}
