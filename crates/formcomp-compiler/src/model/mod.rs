//! Computation model: sections, cells and the expression arena
//!
//! The binder builds a [`ComputationModel`], the transformer mutates it in place, and the
//! engine finally takes ownership of the frozen result. Sections, cells and expression nodes
//! live in arenas and refer to each other by index.

mod describe;
mod expr;

use std::fmt;

use formcomp_core::{CellIndex, RangeIndex};

pub use expr::{ExprArena, ExprId, ExprNode, Operator};

use crate::shape::Shape;
use crate::value::{DataType, Value};

/// Index of a cell in a [`ComputationModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a section in a [`ComputationModel`]; the root section is always index 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(u32);

impl SectionId {
    pub const ROOT: SectionId = SectionId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Direction in which a repeating section grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// One repetition per row
    #[default]
    Vertical,
    /// One repetition per column
    Horizontal,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
        })
    }
}

/// A cell taking part in the computation
#[derive(Debug, Clone)]
pub struct CellModel {
    /// Display name, e.g. `B3` or `Rates!B3`
    pub name: String,
    pub index: CellIndex,
    pub section: SectionId,
    pub constant: Option<Value>,
    pub expression: Option<ExprId>,
    pub data_type: Option<DataType>,
    /// Input slot supplying the cell's value
    pub input: Option<String>,
    /// Output slots reading the cell
    pub outputs: Vec<String>,
    removed: bool,
}

impl CellModel {
    pub fn is_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn is_output(&self) -> bool {
        !self.outputs.is_empty()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// The root section or a repeating section
#[derive(Debug, Clone)]
pub struct SectionModel {
    pub name: String,
    pub parent: Option<SectionId>,
    pub children: Vec<SectionId>,
    pub cells: Vec<CellId>,
    pub orientation: Orientation,
    /// Full extent on the sheet; `None` for the root
    pub range: Option<RangeIndex>,
    /// The first repetition, which holds the formulas; `None` for the root
    pub template: Option<RangeIndex>,
    pub input_slot: Option<String>,
    pub output_slot: Option<String>,
}

/// Sections, cells and expressions of one compilation
#[derive(Debug, Clone)]
pub struct ComputationModel {
    sections: Vec<SectionModel>,
    cells: Vec<CellModel>,
    exprs: ExprArena,
    input_shape: Shape,
    output_shape: Shape,
}

impl ComputationModel {
    /// A model holding only the root section
    pub fn new(input_shape: Shape, output_shape: Shape) -> Self {
        let root = SectionModel {
            name: "root".to_string(),
            parent: None,
            children: Vec::new(),
            cells: Vec::new(),
            orientation: Orientation::Vertical,
            range: None,
            template: None,
            input_slot: None,
            output_slot: None,
        };
        Self {
            sections: vec![root],
            cells: Vec::new(),
            exprs: ExprArena::new(),
            input_shape,
            output_shape,
        }
    }

    // === Sections ===

    pub fn root(&self) -> SectionId {
        SectionId::ROOT
    }

    pub fn section(&self, id: SectionId) -> &SectionModel {
        &self.sections[id.index()]
    }

    pub fn section_mut(&mut self, id: SectionId) -> &mut SectionModel {
        &mut self.sections[id.index()]
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionId, &SectionModel)> {
        self.sections
            .iter()
            .enumerate()
            .map(|(i, s)| (SectionId(i as u32), s))
    }

    pub fn add_section(
        &mut self,
        parent: SectionId,
        name: impl Into<String>,
        orientation: Orientation,
        range: RangeIndex,
        template: RangeIndex,
    ) -> SectionId {
        let id = SectionId(self.sections.len() as u32);
        self.sections.push(SectionModel {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            cells: Vec::new(),
            orientation,
            range: Some(range),
            template: Some(template),
            input_slot: None,
            output_slot: None,
        });
        self.sections[parent.index()].children.push(id);
        id
    }

    pub fn depth(&self, section: SectionId) -> usize {
        let mut depth = 0;
        let mut current = section;
        while let Some(parent) = self.section(current).parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Whether `ancestor` is `section` or one of its enclosing sections
    pub fn is_ancestor(&self, ancestor: SectionId, section: SectionId) -> bool {
        let mut current = Some(section);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.section(id).parent;
        }
        false
    }

    /// Innermost section enclosing both `a` and `b`
    pub fn common_ancestor(&self, a: SectionId, b: SectionId) -> SectionId {
        let (mut a, mut b) = (a, b);
        let (mut da, mut db) = (self.depth(a), self.depth(b));
        while da > db {
            a = self.section(a).parent.unwrap_or(SectionId::ROOT);
            da -= 1;
        }
        while db > da {
            b = self.section(b).parent.unwrap_or(SectionId::ROOT);
            db -= 1;
        }
        while a != b {
            a = self.section(a).parent.unwrap_or(SectionId::ROOT);
            b = self.section(b).parent.unwrap_or(SectionId::ROOT);
        }
        a
    }

    // === Cells ===

    pub fn cell(&self, id: CellId) -> &CellModel {
        &self.cells[id.index()]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut CellModel {
        &mut self.cells[id.index()]
    }

    /// Cells still taking part in the computation
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &CellModel)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.removed)
            .map(|(i, c)| (CellId(i as u32), c))
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells().map(|(id, _)| id).collect()
    }

    pub fn add_cell(
        &mut self,
        section: SectionId,
        name: impl Into<String>,
        index: CellIndex,
    ) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(CellModel {
            name: name.into(),
            index,
            section,
            constant: None,
            expression: None,
            data_type: None,
            input: None,
            outputs: Vec::new(),
            removed: false,
        });
        self.sections[section.index()].cells.push(id);
        id
    }

    /// Take a cell out of its section; its id stays valid but is no longer listed
    pub fn remove_cell(&mut self, id: CellId) {
        let section = self.cells[id.index()].section;
        self.cells[id.index()].removed = true;
        self.sections[section.index()].cells.retain(|c| *c != id);
    }

    /// Live cell bound to `slot` as an output of `section`
    pub fn output_cell(&self, section: SectionId, slot: &str) -> Option<CellId> {
        self.section(section)
            .cells
            .iter()
            .copied()
            .find(|id| self.cell(*id).outputs.iter().any(|o| o == slot))
    }

    /// Child section of `section` bound to the output section slot `slot`
    pub fn output_section(&self, section: SectionId, slot: &str) -> Option<SectionId> {
        self.section(section)
            .children
            .iter()
            .copied()
            .find(|id| self.section(*id).output_slot.as_deref() == Some(slot))
    }

    /// Expression roots of all live cells
    pub fn expression_roots(&self) -> Vec<ExprId> {
        self.cells().filter_map(|(_, c)| c.expression).collect()
    }

    // === Expressions ===

    pub fn exprs(&self) -> &ExprArena {
        &self.exprs
    }

    pub fn exprs_mut(&mut self) -> &mut ExprArena {
        &mut self.exprs
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        self.exprs.get(id)
    }

    pub fn add_expr(&mut self, node: ExprNode) -> ExprId {
        self.exprs.add(node)
    }

    // === Contract ===

    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    pub fn output_shape(&self) -> &Shape {
        &self.output_shape
    }
}
