//! Expression nodes and the arena that owns them

use std::fmt;

use formcomp_formula::{Aggregator, Function};

use super::{CellId, SectionId};
use crate::value::{DataType, Value};

/// Index of a node in an [`ExprArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-arity operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    Negate,
    Percent,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    /// Smaller of two numbers, produced by the MIN rewrite
    Min,
    /// Larger of two numbers, produced by the MAX rewrite
    Max,
    /// Yields null; stands for a reference to a blank cell
    Noop,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus | Operator::Negate => "-",
            Operator::Times => "*",
            Operator::Divide => "/",
            Operator::Power => "^",
            Operator::Percent => "%",
            Operator::Concat => "&",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::Noop => "noop",
        }
    }

    /// Operand order does not affect the result
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Operator::Plus
                | Operator::Times
                | Operator::Equal
                | Operator::NotEqual
                | Operator::Min
                | Operator::Max
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::LessOrEqual
                | Operator::Greater
                | Operator::GreaterOrEqual
        )
    }
}

/// A node of the computation model's expression graph
///
/// Children are [`ExprId`]s into the owning arena, so subtrees can be shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprNode {
    Constant(Value),
    /// Value of a cell in the same section
    CellRef(CellId),
    /// Rectangular array stored sparsely: `positions[i]` is the row-major offset of
    /// `elements[i]`, ascending; offsets without an element are blank
    Range {
        rows: u32,
        cols: u32,
        positions: Vec<u64>,
        elements: Vec<ExprId>,
    },
    Operator {
        op: Operator,
        args: Vec<ExprId>,
    },
    Function {
        function: Function,
        args: Vec<ExprId>,
    },
    Aggregate {
        aggregator: Aggregator,
        args: Vec<ExprId>,
    },
    /// `acc = seed; for elt in source: acc = step`, or `when_empty` when nothing was folded
    Fold {
        acc: String,
        elt: String,
        seed: ExprId,
        step: ExprId,
        when_empty: Option<ExprId>,
        source: Vec<ExprId>,
    },
    /// Number of numeric elements in the source
    Count {
        source: Vec<ExprId>,
    },
    Let {
        name: String,
        value: ExprId,
        body: ExprId,
    },
    LetVar(String),
    /// Evaluate `expr` in the frame of the enclosing section
    ParentSection {
        section: SectionId,
        expr: ExprId,
    },
    /// Evaluate `elements` once per repetition of the sub-section
    SubSection {
        section: SectionId,
        elements: Vec<ExprId>,
    },
}

impl ExprNode {
    pub fn constant(value: impl Into<Value>) -> Self {
        ExprNode::Constant(value.into())
    }

    pub fn op(op: Operator, args: Vec<ExprId>) -> Self {
        ExprNode::Operator { op, args }
    }

    /// Range with an element at every offset
    pub fn range(rows: u32, cols: u32, elements: Vec<ExprId>) -> Self {
        ExprNode::Range {
            rows,
            cols,
            positions: (0..elements.len() as u64).collect(),
            elements,
        }
    }

    /// Range from `(offset, element)` pairs in ascending offset order
    pub fn sparse_range(rows: u32, cols: u32, entries: Vec<(u64, ExprId)>) -> Self {
        let (positions, elements) = entries.into_iter().unzip();
        ExprNode::Range {
            rows,
            cols,
            positions,
            elements,
        }
    }

    /// Element of a range at a row-major offset; `None` for blanks and non-range nodes
    pub fn element_at(&self, offset: u64) -> Option<ExprId> {
        match self {
            ExprNode::Range {
                positions,
                elements,
                ..
            } => positions
                .binary_search(&offset)
                .ok()
                .and_then(|i| elements.get(i).copied()),
            _ => None,
        }
    }

    /// Child ids in a fixed order, matching [`ExprNode::with_children`]
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            ExprNode::Constant(_) | ExprNode::CellRef(_) | ExprNode::LetVar(_) => Vec::new(),
            ExprNode::Range { elements, .. } | ExprNode::SubSection { elements, .. } => {
                elements.clone()
            }
            ExprNode::Operator { args, .. }
            | ExprNode::Function { args, .. }
            | ExprNode::Aggregate { args, .. } => args.clone(),
            ExprNode::Fold {
                seed,
                step,
                when_empty,
                source,
                ..
            } => {
                let mut children = vec![*seed, *step];
                children.extend(when_empty.iter().copied());
                children.extend(source.iter().copied());
                children
            }
            ExprNode::Count { source } => source.clone(),
            ExprNode::Let { value, body, .. } => vec![*value, *body],
            ExprNode::ParentSection { expr, .. } => vec![*expr],
        }
    }

    /// Same node with its children replaced, in [`ExprNode::children`] order
    pub fn with_children(&self, children: Vec<ExprId>) -> ExprNode {
        let mut it = children.into_iter();
        let mut next = |fallback: ExprId| it.next().unwrap_or(fallback);
        match self {
            ExprNode::Constant(_) | ExprNode::CellRef(_) | ExprNode::LetVar(_) => self.clone(),
            ExprNode::Range {
                rows,
                cols,
                positions,
                elements,
            } => ExprNode::Range {
                rows: *rows,
                cols: *cols,
                positions: positions.clone(),
                elements: elements.iter().map(|e| next(*e)).collect(),
            },
            ExprNode::SubSection { section, elements } => ExprNode::SubSection {
                section: *section,
                elements: elements.iter().map(|e| next(*e)).collect(),
            },
            ExprNode::Operator { op, args } => ExprNode::Operator {
                op: *op,
                args: args.iter().map(|a| next(*a)).collect(),
            },
            ExprNode::Function { function, args } => ExprNode::Function {
                function: *function,
                args: args.iter().map(|a| next(*a)).collect(),
            },
            ExprNode::Aggregate { aggregator, args } => ExprNode::Aggregate {
                aggregator: *aggregator,
                args: args.iter().map(|a| next(*a)).collect(),
            },
            ExprNode::Fold {
                acc,
                elt,
                seed,
                step,
                when_empty,
                source,
            } => ExprNode::Fold {
                acc: acc.clone(),
                elt: elt.clone(),
                seed: next(*seed),
                step: next(*step),
                when_empty: when_empty.map(|w| next(w)),
                source: source.iter().map(|s| next(*s)).collect(),
            },
            ExprNode::Count { source } => ExprNode::Count {
                source: source.iter().map(|s| next(*s)).collect(),
            },
            ExprNode::Let { name, value, body } => ExprNode::Let {
                name: name.clone(),
                value: next(*value),
                body: next(*body),
            },
            ExprNode::ParentSection { section, expr } => ExprNode::ParentSection {
                section: *section,
                expr: next(*expr),
            },
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ExprNode::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            ExprNode::Constant(v) => Some(v),
            _ => None,
        }
    }
}

/// Owner of every expression node of a model, with a side table of annotated types
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
    types: Vec<Option<DataType>>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: ExprNode) -> ExprId {
        self.add_typed(node, None)
    }

    pub fn add_typed(&mut self, node: ExprNode, data_type: Option<DataType>) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.types.push(data_type);
        id
    }

    pub fn get(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn data_type(&self, id: ExprId) -> Option<DataType> {
        self.types[id.index()]
    }

    pub fn set_type(&mut self, id: ExprId, data_type: DataType) {
        self.types[id.index()] = Some(data_type);
    }

    /// `id` with new children; returns `id` itself when nothing changed
    pub fn rebuild(&mut self, id: ExprId, children: Vec<ExprId>) -> ExprId {
        let node = self.get(id);
        if node.children() == children {
            return id;
        }
        let rebuilt = node.with_children(children);
        self.add_typed(rebuilt, self.data_type(id))
    }

    /// Every node reachable from `roots`, each listed once, children before parents
    pub fn post_order(&self, roots: impl IntoIterator<Item = ExprId>) -> Vec<ExprId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        for root in roots {
            let mut stack = vec![(root, false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    order.push(id);
                    continue;
                }
                if visited[id.index()] {
                    continue;
                }
                visited[id.index()] = true;
                stack.push((id, true));
                for child in self.get(id).children().into_iter().rev() {
                    if !visited[child.index()] {
                        stack.push((child, false));
                    }
                }
            }
        }
        order
    }
}
